//! 测试用的小型产物：词表 + embedding/pooling/dense 网络

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::Dtype;

pub const TOKENIZER_JSON_WORD_INDEX: &str =
    r#"{"<OOV>": 1, "aliens": 2, "landed": 3, "government": 4, "passed": 5, "bill": 6, "cat": 7}"#;

/// Keras `to_json()` 的格式，word_index 以字符串嵌入
pub fn tokenizer_json() -> String {
    let encoded = serde_json::to_string(TOKENIZER_JSON_WORD_INDEX).unwrap();
    format!(
        r##"{{"class_name": "Tokenizer", "config": {{"num_words": null, "filters": "!\"#$%&()*+,-./:;<=>?@[\\]^_`{{|}}~\t\n", "lower": true, "split": " ", "char_level": false, "oov_token": "<OOV>", "document_count": 4, "word_index": {encoded}}}}}"##
    )
}

/// 8 x 2 的 embedding：假新闻词指向 -x，真新闻词指向 +x
pub fn embedding_table() -> Vec<f32> {
    vec![
        0.0, 0.0, // padding
        0.0, 0.0, // <OOV>
        -1.0, 0.0, // aliens
        -1.0, 0.0, // landed
        1.0, 0.0, // government
        1.0, 0.0, // passed
        1.0, 0.0, // bill
        0.0, 1.0, // cat
    ]
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bf16_bytes(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| half::bf16::from_f32(*v).to_le_bytes())
        .collect()
}

pub fn write_safetensors(path: &Path, tensors: &[(&str, Vec<usize>, Vec<f32>)], dtype: Dtype) {
    let encoded: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
        .iter()
        .map(|(name, shape, data)| {
            let bytes = match dtype {
                Dtype::BF16 => bf16_bytes(data),
                _ => f32_bytes(data),
            };
            (name.to_string(), shape.clone(), bytes)
        })
        .collect();

    let views: HashMap<String, TensorView<'_>> = encoded
        .iter()
        .map(|(name, shape, bytes)| {
            (name.clone(), TensorView::new(dtype, shape.clone(), bytes).unwrap())
        })
        .collect();

    let serialized = safetensors::tensor::serialize(views, &None).unwrap();
    fs::write(path, serialized).unwrap();
}

/// 单 sigmoid 输出的模型目录：embedding -> GAP -> dense(1, sigmoid)
pub fn write_sigmoid_model(dir: &Path, max_length: usize, dtype: Dtype) {
    fs::create_dir_all(dir).unwrap();
    let config = serde_json::json!({
        "max_length": max_length,
        "padding": "post",
        "truncating": "post",
        "layers": [
            {"type": "embedding", "input_dim": 8, "output_dim": 2},
            {"type": "global_average_pooling1d"},
            {"type": "dropout", "rate": 0.3},
            {"type": "dense", "units": 1, "activation": "sigmoid"}
        ]
    });
    fs::write(dir.join("config.json"), config.to_string()).unwrap();
    write_safetensors(
        &dir.join("model.safetensors"),
        &[
            ("embedding.embeddings", vec![8, 2], embedding_table()),
            ("dense.kernel", vec![2, 1], vec![4.0, 0.0]),
            ("dense.bias", vec![1], vec![0.0]),
        ],
        dtype,
    );
}

/// 两类 softmax 输出的模型目录：embedding(mask_zero) -> GAP -> dense(2, softmax)
pub fn write_softmax_model(dir: &Path, max_length: usize) {
    fs::create_dir_all(dir).unwrap();
    let config = serde_json::json!({
        "max_length": max_length,
        "layers": [
            {"type": "embedding", "input_dim": 8, "output_dim": 2, "mask_zero": true},
            {"type": "global_average_pooling1d"},
            {"type": "dense", "units": 2, "activation": "softmax"}
        ]
    });
    fs::write(dir.join("config.json"), config.to_string()).unwrap();
    // 第 1 列对应 FAKE：x 越小越像假新闻
    write_safetensors(
        &dir.join("model.safetensors"),
        &[
            ("embedding.embeddings", vec![8, 2], embedding_table()),
            ("dense.kernel", vec![2, 2], vec![2.0, -2.0, 0.0, 0.0]),
            ("dense.bias", vec![2], vec![0.0, 0.0]),
        ],
        Dtype::F32,
    );
}

pub fn write_tokenizer(path: &Path) {
    fs::write(path, tokenizer_json()).unwrap();
}
