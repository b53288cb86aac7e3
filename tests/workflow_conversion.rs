use atelier::GenerationError;
use atelier::workflow::{
    POSITIVE_PROMPT_NODE, SAMPLER_NODE, WorkflowGraph, WorkflowTemplate,
};
use serde_json::{Value, json};

fn graph(value: Value) -> WorkflowGraph {
    WorkflowGraph::from_json(&value.to_string()).unwrap()
}

#[test]
fn test_ksampler_widgets_become_named_inputs() {
    let g = graph(json!({
        "last_node_id": 3,
        "nodes": [
            {"id": 1, "type": "CheckpointLoaderSimple", "widgets_values": ["model.safetensors"],
             "pos": [0, 0], "size": [300, 100]},
            {"id": 2, "type": "EmptyLatentImage", "widgets_values": [832, 1216, 1]},
            {"id": 3, "type": "KSampler",
             "inputs": [
                 {"name": "model", "type": "MODEL", "link": 10},
                 {"name": "latent_image", "type": "LATENT", "link": 11}
             ],
             "widgets_values": [123456, "fixed", 25, 6.5, "dpmpp_2m", "karras", 0.8]}
        ],
        "links": [
            [10, 1, 0, 3, 0, "MODEL"],
            [11, 2, 0, 3, 3, "LATENT"]
        ],
        "version": 0.4
    }));

    let job = g.to_job().unwrap();
    let sampler = &job["3"];
    assert_eq!(sampler.class_type, "KSampler");

    let names = [
        "seed",
        "control_after_generate",
        "steps",
        "cfg",
        "sampler_name",
        "scheduler",
        "denoise",
    ];
    let values = [
        json!(123456),
        json!("fixed"),
        json!(25),
        json!(6.5),
        json!("dpmpp_2m"),
        json!("karras"),
        json!(0.8),
    ];
    for (name, value) in names.iter().zip(values) {
        assert_eq!(sampler.inputs[*name], value, "input {}", name);
    }
    assert_eq!(sampler.inputs["model"], json!(["1", 0]));
    assert_eq!(sampler.inputs["latent_image"], json!(["2", 0]));
    assert_eq!(job["2"].inputs["height"], json!(1216));
}

#[test]
fn test_unsupported_node_is_rejected() {
    let g = graph(json!({
        "nodes": [
            {"id": 1, "type": "KSampler", "widgets_values": [1, "fixed", 20, 7, "euler", "normal", 1]},
            {"id": 2, "type": "UltimateSDUpscale", "widgets_values": [2.0]}
        ],
        "links": []
    }));

    match g.to_job() {
        Err(GenerationError::UnsupportedNode(message)) => {
            assert!(message.contains("UltimateSDUpscale"))
        }
        other => panic!("expected UnsupportedNode, got {:?}", other),
    }
}

#[test]
fn test_dangling_link_is_rejected() {
    let g = graph(json!({
        "nodes": [
            {"id": 6, "type": "VAEDecode",
             "inputs": [{"name": "samples", "type": "LATENT", "link": 99}]}
        ],
        "links": []
    }));
    assert!(matches!(g.to_job(), Err(GenerationError::WorkflowError(_))));
}

#[test]
fn test_surplus_widgets_are_rejected() {
    let g = graph(json!({
        "nodes": [{"id": 1, "type": "CLIPTextEncode", "widgets_values": ["a", "b"]}],
        "links": []
    }));
    assert!(!g.validate().is_safe());
    assert!(g.to_job().is_err());
}

#[tokio::test]
async fn test_template_injection_survives_conversion() {
    let mut g = WorkflowGraph::load(WorkflowTemplate::TextToImage, None)
        .await
        .unwrap();
    let prompt = "Wearing a \"sheer\" coat,\nback slash \\ and unicode ✨";
    g.set_widget(POSITIVE_PROMPT_NODE, 0, prompt).unwrap();
    g.set_widget(SAMPLER_NODE, 0, 987_654_321u64).unwrap();

    let job = g.to_job().unwrap();
    assert_eq!(job["45"].inputs["text"], json!(prompt));
    assert_eq!(job["44"].inputs["seed"], json!(987_654_321u64));
    assert_eq!(job["44"].inputs["negative"], json!(["42", 0]));
    assert_eq!(job["42"].inputs["conditioning"], json!(["45", 0]));

    // The serialized job must parse back to the same structure.
    let wire = serde_json::to_string(&job).unwrap();
    let reparsed: Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(reparsed["45"]["inputs"]["text"], json!(prompt));
    assert_eq!(reparsed["44"]["class_type"], json!("KSampler"));
}
