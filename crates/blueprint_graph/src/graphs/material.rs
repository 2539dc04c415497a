// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material graph catalog.
//!
//! The material editor shares the graph core; its nodes are pure data flow
//! into a single result node. Colors travel as `vector` pins.

use crate::node::{NodeKind, NodeTemplate};
use crate::pin::{PinTemplate, PinType, PinValue};
use crate::registry::NodeRegistry;

/// Create the material graph node registry with all available node types
pub fn create_material_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Output
    // ========================================================================

    registry.register(
        NodeTemplate::new("MainMaterialNode", "Material", NodeKind::Function)
            .with_category("Output")
            .with_description("Final material attributes")
            .with_pins(vec![
                PinTemplate::input("base_color", "Base Color", PinType::Vector)
                    .with_default(PinValue::Vector([0.8, 0.8, 0.8])),
                PinTemplate::input("metallic", "Metallic", PinType::Float),
                PinTemplate::input("specular", "Specular", PinType::Float).with_default(PinValue::Float(0.5)),
                PinTemplate::input("roughness", "Roughness", PinType::Float).with_default(PinValue::Float(0.5)),
                PinTemplate::input("emissive_color", "Emissive Color", PinType::Vector),
                PinTemplate::input("opacity", "Opacity", PinType::Float).with_default(PinValue::Float(1.0)),
                PinTemplate::input("normal", "Normal", PinType::Vector).with_default(PinValue::Vector([0.0, 0.0, 1.0])),
                PinTemplate::input("ambient_occlusion", "Ambient Occlusion", PinType::Float)
                    .with_default(PinValue::Float(1.0)),
            ])
            .singleton(),
    );

    // ========================================================================
    // Constants
    // ========================================================================

    registry.register(
        NodeTemplate::new("Constant", "Constant", NodeKind::Pure)
            .with_category("Constants")
            .with_pins(vec![PinTemplate::output("value", "Value", PinType::Float)])
            .with_custom_data(serde_json::json!({ "value": 0.0 })),
    );

    registry.register(
        NodeTemplate::new("Constant3Vector", "Constant3Vector", NodeKind::Pure)
            .with_category("Constants")
            .with_pins(vec![
                PinTemplate::output("rgb", "RGB", PinType::Vector),
                PinTemplate::output("r", "R", PinType::Float),
                PinTemplate::output("g", "G", PinType::Float),
                PinTemplate::output("b", "B", PinType::Float),
            ])
            .with_custom_data(serde_json::json!({ "value": [0.0, 0.0, 0.0] })),
    );

    // ========================================================================
    // Math
    // ========================================================================

    for (key, title) in [("Add", "Add"), ("Multiply", "Multiply")] {
        registry.register(
            NodeTemplate::new(key, title, NodeKind::Pure)
                .with_category("Math")
                .with_pins(vec![
                    PinTemplate::input("a", "A", PinType::Float),
                    PinTemplate::input("b", "B", PinType::Float),
                    PinTemplate::output("result", "Result", PinType::Float),
                ]),
        );
    }

    registry.register(
        NodeTemplate::new("Lerp", "Lerp", NodeKind::Pure)
            .with_category("Math")
            .with_description("Blend between A and B by Alpha")
            .with_pins(vec![
                PinTemplate::input("a", "A", PinType::Float),
                PinTemplate::input("b", "B", PinType::Float).with_default(PinValue::Float(1.0)),
                PinTemplate::input("alpha", "Alpha", PinType::Float).with_default(PinValue::Float(0.5)),
                PinTemplate::output("result", "Result", PinType::Float),
            ]),
    );

    registry.register(
        NodeTemplate::new("OneMinus", "1-x", NodeKind::Pure)
            .with_category("Math")
            .with_pins(vec![
                PinTemplate::input("input", "Input", PinType::Float),
                PinTemplate::output("result", "Result", PinType::Float),
            ]),
    );

    // ========================================================================
    // Texture
    // ========================================================================

    registry.register(
        NodeTemplate::new("TextureSample", "Texture Sample", NodeKind::Pure)
            .with_category("Texture")
            .with_pins(vec![
                PinTemplate::input("uvs", "UVs", PinType::Vector),
                PinTemplate::input("texture", "Tex", PinType::Object),
                PinTemplate::output("rgb", "RGB", PinType::Vector),
                PinTemplate::output("r", "R", PinType::Float),
                PinTemplate::output("g", "G", PinType::Float),
                PinTemplate::output("b", "B", PinType::Float),
                PinTemplate::output("a", "A", PinType::Float),
            ]),
    );

    registry.register(
        NodeTemplate::new("TextureCoordinate", "TexCoord", NodeKind::Pure)
            .with_category("Texture")
            .with_pins(vec![PinTemplate::output("uvs", "UVs", PinType::Vector)])
            .with_custom_data(serde_json::json!({ "coordinateIndex": 0, "uTiling": 1.0, "vTiling": 1.0 })),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_material_registry() {
        let registry = create_material_registry();
        assert_eq!(registry.len(), 9);
        assert!(registry.get("MainMaterialNode").is_some_and(|t| t.is_singleton));
        assert!(registry.templates().all(|t| t.pins.iter().all(|p| !p.pin_type.is_exec())));
    }

    #[test]
    fn test_texture_into_result() {
        let registry = create_material_registry();
        let mut graph = Graph::new("Material");
        let result = graph.add_node(&registry, "MainMaterialNode", 400.0, 0.0).unwrap();
        let texture = graph.add_node(&registry, "TextureSample", 0.0, 0.0).unwrap();
        let coords = graph.add_node(&registry, "TextureCoordinate", -200.0, 0.0).unwrap();

        let rgb = graph.node(&texture).unwrap().pin_id("rgb");
        let base_color = graph.node(&result).unwrap().pin_id("base_color");
        graph.connect(&rgb, &base_color).unwrap();
        let uvs_out = graph.node(&coords).unwrap().pin_id("uvs");
        let uvs_in = graph.node(&texture).unwrap().pin_id("uvs");
        graph.connect(&uvs_out, &uvs_in).unwrap();

        assert_eq!(graph.link_count(), 2);
        assert!(graph.add_node(&registry, "MainMaterialNode", 0.0, 0.0).is_none());
    }
}
