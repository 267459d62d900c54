#![cfg(feature = "hf")]

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::Dtype;
use tempfile::TempDir;

use tokenlens::hf::matrix_from_safetensors;
use tokenlens::{nearest_tokens, EmbeddingSource, HfTokenizer, SafetensorsEmbeddings, Tokenizer};

const TOKENIZER_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": { "[UNK]": 0, "hello": 1, "world": 2, "→": 3 },
    "unk_token": "[UNK]"
  }
}"#;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn safetensors_file(name: &str, dtype: Dtype, shape: Vec<usize>, raw: &[u8]) -> Vec<u8> {
    let view = TensorView::new(dtype, shape, raw).unwrap();
    let mut tensors = HashMap::new();
    tensors.insert(name.to_string(), view);
    safetensors::serialize(&tensors, &None).unwrap()
}

fn rows() -> Vec<f32> {
    vec![
        0.0, 0.0, 1.0, //
        1.0, 0.0, 0.0, //
        0.9, 0.1, 0.0, //
        -1.0, 0.0, 0.0,
    ]
}

#[test]
fn probes_known_tensor_names() {
    let bytes = safetensors_file("transformer.wte.weight", Dtype::F32, vec![4, 3], &f32_bytes(&rows()));
    let m = matrix_from_safetensors(&bytes, None, Path::new("mem")).unwrap();
    assert_eq!((m.vocab_size(), m.dim()), (4, 3));
    assert_eq!(m.row(2).unwrap(), &[0.9, 0.1, 0.0]);
}

#[test]
fn explicit_tensor_name_must_exist() {
    let bytes = safetensors_file("lm_head.weight", Dtype::F32, vec![4, 3], &f32_bytes(&rows()));
    let err = matrix_from_safetensors(&bytes, None, Path::new("mem")).unwrap_err();
    assert!(err.is_load());

    let m = matrix_from_safetensors(&bytes, Some("lm_head.weight"), Path::new("mem")).unwrap();
    assert_eq!(m.vocab_size(), 4);
}

#[test]
fn half_precision_tensors_are_widened() {
    let raw: Vec<u8> = [1.0f32, -2.0, 0.5, 4.0]
        .iter()
        .flat_map(|&v| half::f16::from_f32(v).to_le_bytes())
        .collect();
    let bytes = safetensors_file("embed_tokens.weight", Dtype::F16, vec![2, 2], &raw);
    let m = matrix_from_safetensors(&bytes, None, Path::new("mem")).unwrap();
    assert_eq!(m.as_slice(), &[1.0, -2.0, 0.5, 4.0]);
}

#[test]
fn rejects_non_matrix_and_unsupported_dtypes() {
    let one_d = safetensors_file("embed_tokens.weight", Dtype::F32, vec![3], &f32_bytes(&[1.0, 2.0, 3.0]));
    assert!(matrix_from_safetensors(&one_d, None, Path::new("mem"))
        .unwrap_err()
        .is_load());

    let ints = safetensors_file("embed_tokens.weight", Dtype::I32, vec![1, 2], &[0u8; 8]);
    assert!(matrix_from_safetensors(&ints, None, Path::new("mem"))
        .unwrap_err()
        .is_load());
}

#[test]
fn missing_weight_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = SafetensorsEmbeddings::new(dir.path().join("absent.safetensors"))
        .embeddings()
        .unwrap_err();
    assert!(err.is_load());
}

#[test]
fn hf_tokenizer_and_safetensors_drive_nearest_search() {
    let dir = TempDir::new().unwrap();
    let tok_path = dir.path().join("tokenizer.json");
    let weights_path = dir.path().join("model.safetensors");
    std::fs::write(&tok_path, TOKENIZER_JSON).unwrap();
    std::fs::write(
        &weights_path,
        safetensors_file("model.embed_tokens.weight", Dtype::F32, vec![4, 3], &f32_bytes(&rows())),
    )
    .unwrap();

    let tokenizer = HfTokenizer::from_file(&tok_path).unwrap();
    assert_eq!(tokenizer.vocab_size(), 4);
    assert_eq!(tokenizer.encode("hello world", false).unwrap(), vec![1, 2]);
    assert_eq!(tokenizer.decode(&[3]).unwrap(), "→");

    let matrix = SafetensorsEmbeddings::new(&weights_path).embeddings().unwrap();
    let result = nearest_tokens(&matrix, &tokenizer, "hello", 2).unwrap();
    assert_eq!(result.query_ids, vec![1]);
    assert_eq!(result.neighbors[0].token, "hello");
    assert_eq!(result.neighbors[1].token, "world");
}

#[test]
fn unreadable_tokenizer_file_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokenizer.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(HfTokenizer::from_file(&path).is_err());
}
