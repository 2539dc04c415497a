// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint event graph catalog.
//!
//! Events, flow control, printing, basic math and boolean logic, plus one
//! conversion node per implicit pin conversion.

use crate::node::{NodeKind, NodeTemplate};
use crate::pin::{ContainerType, PinTemplate, PinType, PinValue};
use crate::registry::NodeRegistry;

fn exec_out(id: &str, name: &str) -> PinTemplate {
    PinTemplate::output(id, name, PinType::Exec)
}

fn exec_in(id: &str, name: &str) -> PinTemplate {
    PinTemplate::input(id, name, PinType::Exec)
}

fn binary_math(key: &str, title: &str, category: &str, pin_type: PinType) -> NodeTemplate {
    NodeTemplate::new(key, title, NodeKind::Pure)
        .with_category(category)
        .with_pins(vec![
            PinTemplate::input("a", "A", pin_type),
            PinTemplate::input("b", "B", pin_type),
            PinTemplate::output("result", "Result", pin_type),
        ])
}

/// Create the Blueprint node registry with all built-in node types
pub fn create_blueprint_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Events
    // ========================================================================

    registry.register(
        NodeTemplate::new("EventBeginPlay", "Event BeginPlay", NodeKind::Event)
            .with_category("Events")
            .with_description("Fires once when play begins")
            .with_icon("fa-play")
            .with_pins(vec![PinTemplate::exec_out()])
            .singleton(),
    );

    registry.register(
        NodeTemplate::new("EventTick", "Event Tick", NodeKind::Event)
            .with_category("Events")
            .with_description("Fires every frame")
            .with_icon("fa-clock")
            .with_pins(vec![
                PinTemplate::exec_out(),
                PinTemplate::output("delta_seconds", "Delta Seconds", PinType::Float),
            ])
            .singleton(),
    );

    registry.register(
        NodeTemplate::new("EventActorBeginOverlap", "Event ActorBeginOverlap", NodeKind::Event)
            .with_category("Events")
            .with_description("Fires when another actor starts overlapping")
            .with_pins(vec![
                PinTemplate::exec_out(),
                PinTemplate::output("other_actor", "Other Actor", PinType::Object),
            ]),
    );

    registry.register(
        NodeTemplate::new("EventOnClicked", "Event OnClicked", NodeKind::Event)
            .with_category("Events")
            .with_description("Fires when the actor is clicked")
            .with_pins(vec![
                PinTemplate::exec_out(),
                PinTemplate::output("touched_actor", "Touched Actor", PinType::Object),
                PinTemplate::output("button_pressed", "Button Pressed", PinType::Name),
            ]),
    );

    registry.register(
        NodeTemplate::new("CustomEvent", "Custom Event", NodeKind::Event)
            .with_category("Events")
            .with_description("User-defined event with optional parameters")
            .with_icon("fa-bolt")
            .with_pins(vec![PinTemplate::exec_out()])
            .with_custom_data(serde_json::json!({ "replication": "NotReplicated", "reliable": false }))
            .dynamic(),
    );

    // ========================================================================
    // Flow Control
    // ========================================================================

    registry.register(
        NodeTemplate::new("Branch", "Branch", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Routes execution on a condition")
            .with_icon("fa-code-branch")
            .with_pins(vec![
                PinTemplate::exec_in(),
                PinTemplate::input("condition", "Condition", PinType::Bool).with_default(PinValue::Bool(true)),
                exec_out("true", "True"),
                exec_out("false", "False"),
            ]),
    );

    registry.register(
        NodeTemplate::new("Sequence", "Sequence", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Runs each output in order")
            .with_pins(vec![PinTemplate::exec_in(), exec_out("then_0", "Then 0"), exec_out("then_1", "Then 1")]),
    );

    registry.register(
        NodeTemplate::new("DoOnce", "DoOnce", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Passes execution through only once until reset")
            .with_pins(vec![
                PinTemplate::exec_in(),
                exec_in("reset", "Reset"),
                PinTemplate::input("start_closed", "Start Closed", PinType::Bool),
                exec_out("completed", "Completed"),
            ]),
    );

    registry.register(
        NodeTemplate::new("DoN", "DoN", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Passes execution through N times")
            .with_pins(vec![
                PinTemplate::exec_in(),
                PinTemplate::input("n", "N", PinType::Int).with_default(PinValue::Int(1)),
                exec_in("reset", "Reset"),
                exec_out("exit", "Exit"),
                PinTemplate::output("counter", "Counter", PinType::Int),
            ]),
    );

    registry.register(
        NodeTemplate::new("FlipFlop", "FlipFlop", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Alternates between two outputs")
            .with_pins(vec![
                PinTemplate::exec_in(),
                exec_out("a", "A"),
                exec_out("b", "B"),
                PinTemplate::output("is_a", "Is A", PinType::Bool),
            ]),
    );

    registry.register(
        NodeTemplate::new("ForLoop", "For Loop", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Runs the loop body for each index in range")
            .with_pins(vec![
                PinTemplate::exec_in(),
                PinTemplate::input("first_index", "First Index", PinType::Int),
                PinTemplate::input("last_index", "Last Index", PinType::Int).with_default(PinValue::Int(10)),
                exec_out("loop_body", "Loop Body"),
                PinTemplate::output("index", "Index", PinType::Int),
                exec_out("completed", "Completed"),
            ]),
    );

    registry.register(
        NodeTemplate::new("ForEachLoop", "For Each Loop", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Runs the loop body for each array element")
            .with_pins(vec![
                PinTemplate::exec_in(),
                PinTemplate::input("array", "Array", PinType::Object).with_container(ContainerType::Array),
                exec_out("loop_body", "Loop Body"),
                PinTemplate::output("element", "Array Element", PinType::Object),
                PinTemplate::output("index", "Array Index", PinType::Int),
                exec_out("completed", "Completed"),
            ]),
    );

    registry.register(
        NodeTemplate::new("Gate", "Gate", NodeKind::Flow)
            .with_category("Flow Control")
            .with_description("Passes execution while open")
            .with_pins(vec![
                exec_in("enter", "Enter"),
                exec_in("open", "Open"),
                exec_in("close", "Close"),
                exec_in("toggle", "Toggle"),
                PinTemplate::input("start_closed", "Start Closed", PinType::Bool),
                exec_out("exit", "Exit"),
            ]),
    );

    // ========================================================================
    // Functions
    // ========================================================================

    registry.register(
        NodeTemplate::new("PrintString", "Print String", NodeKind::Function)
            .with_category("String")
            .with_description("Prints a string to the screen and log")
            .with_icon("fa-terminal")
            .with_pins(vec![
                PinTemplate::exec_in(),
                PinTemplate::input("in_string", "In String", PinType::String)
                    .with_default(PinValue::String("Hello".to_string())),
                PinTemplate::input("print_to_screen", "Print to Screen", PinType::Bool).with_default(PinValue::Bool(true)),
                PinTemplate::input("duration", "Duration", PinType::Float).with_default(PinValue::Float(2.0)),
                PinTemplate::exec_out(),
            ]),
    );

    // ========================================================================
    // Math
    // ========================================================================

    registry.register(binary_math("AddInt", "Add (Integer)", "Math|Integer", PinType::Int));
    registry.register(binary_math("AddFloat", "Add (Float)", "Math|Float", PinType::Float));
    registry.register(binary_math("SubtractFloat", "Subtract (Float)", "Math|Float", PinType::Float));
    registry.register(binary_math("MultiplyFloat", "Multiply (Float)", "Math|Float", PinType::Float));
    registry.register(
        NodeTemplate::new("DivideFloat", "Divide (Float)", NodeKind::Pure)
            .with_category("Math|Float")
            .with_pins(vec![
                PinTemplate::input("a", "A", PinType::Float),
                PinTemplate::input("b", "B", PinType::Float).with_default(PinValue::Float(1.0)),
                PinTemplate::output("result", "Result", PinType::Float),
            ]),
    );

    registry.register(binary_math("OR", "OR", "Math|Boolean", PinType::Bool));
    registry.register(binary_math("AND", "AND", "Math|Boolean", PinType::Bool));
    registry.register(
        NodeTemplate::new("NOT", "NOT", NodeKind::Pure)
            .with_category("Math|Boolean")
            .with_pins(vec![
                PinTemplate::input("a", "A", PinType::Bool),
                PinTemplate::output("result", "Result", PinType::Bool),
            ]),
    );

    // ========================================================================
    // Conversions
    // ========================================================================

    for (from, to, key) in PinType::conversions() {
        let category = match to {
            PinType::String => "String",
            PinType::Float => "Math|Float",
            _ => "Math|Integer",
        };
        registry.register(
            NodeTemplate::new(
                *key,
                format!("{} To {}", from.display_name(), to.display_name()),
                NodeKind::Pure,
            )
            .with_category(category)
            .with_pins(vec![
                PinTemplate::input("val_in", from.display_name(), *from),
                PinTemplate::output("val_out", to.display_name(), *to),
            ]),
        );
    }

    // ========================================================================
    // Utility
    // ========================================================================

    registry.register(
        NodeTemplate::new("Comment", "Comment", NodeKind::Comment)
            .with_category("Development")
            .with_description("Free-floating note")
            .with_custom_data(serde_json::json!({ "text": "", "width": 400, "height": 200 })),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blueprint_registry() {
        let registry = create_blueprint_registry();
        assert!(registry.get("EventBeginPlay").is_some_and(|t| t.is_singleton));
        assert!(registry.get("EventTick").is_some_and(|t| t.is_singleton));
        assert!(registry.get("CustomEvent").is_some_and(|t| t.dynamic_pins));
        assert_eq!(registry.templates_in_category("Events").count(), 5);
        assert_eq!(registry.templates_in_category("Flow Control").count(), 8);
    }

    #[test]
    fn test_every_conversion_has_a_node() {
        let registry = create_blueprint_registry();
        for (from, to, key) in PinType::conversions() {
            let template = registry.get(key).unwrap();
            assert_eq!(template.pin("val_in").map(|p| p.pin_type), Some(*from));
            assert_eq!(template.pin("val_out").map(|p| p.pin_type), Some(*to));
        }
    }

    #[test]
    fn test_pin_ids_unique_per_template() {
        let registry = create_blueprint_registry();
        for template in registry.templates() {
            let mut ids: Vec<&str> = template.pins.iter().map(|p| p.id.as_str()).collect();
            ids.sort_unstable();
            let before = ids.len();
            ids.dedup();
            assert_eq!(ids.len(), before, "duplicate pin id in {}", template.key);
        }
    }
}
