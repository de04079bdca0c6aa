//! 测试用产物：四步长的 embedding -> GAP -> dense(1, sigmoid) 网络

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use newsclf_server::config::{LoadMode, ServerConfig};
use safetensors::tensor::TensorView;
use safetensors::Dtype;

pub const MAX_LENGTH: usize = 4;

pub fn write_tokenizer(path: &Path) {
    let word_index = serde_json::json!({
        "<OOV>": 1, "aliens": 2, "landed": 3, "government": 4, "passed": 5, "bill": 6, "cat": 7
    });
    let tokenizer = serde_json::json!({
        "class_name": "Tokenizer",
        "config": {
            "num_words": null,
            "lower": true,
            "split": " ",
            "char_level": false,
            "oov_token": "<OOV>",
            "word_index": word_index.to_string(),
        }
    });
    fs::write(path, tokenizer.to_string()).unwrap();
}

/// 假新闻词的 embedding 为 -1，真新闻词为 +1
pub fn write_model(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let config = serde_json::json!({
        "max_length": MAX_LENGTH,
        "layers": [
            {"type": "embedding", "input_dim": 8, "output_dim": 1},
            {"type": "global_average_pooling1d"},
            {"type": "dense", "units": 1, "activation": "sigmoid"}
        ]
    });
    fs::write(dir.join("config.json"), config.to_string()).unwrap();

    let tensors: Vec<(&str, Vec<usize>, Vec<f32>)> = vec![
        ("embedding.embeddings", vec![8, 1], vec![0.0, 0.0, -1.0, -1.0, 1.0, 1.0, 1.0, 0.0]),
        ("dense.kernel", vec![1, 1], vec![4.0]),
        ("dense.bias", vec![1], vec![0.0]),
    ];
    let encoded: Vec<(String, Vec<usize>, Vec<u8>)> = tensors
        .into_iter()
        .map(|(name, shape, data)| {
            let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name.to_string(), shape, bytes)
        })
        .collect();
    let views: HashMap<String, TensorView<'_>> = encoded
        .iter()
        .map(|(name, shape, bytes)| {
            (name.clone(), TensorView::new(Dtype::F32, shape.clone(), bytes).unwrap())
        })
        .collect();
    let serialized = safetensors::tensor::serialize(views, &None).unwrap();
    fs::write(dir.join("model.safetensors"), serialized).unwrap();
}

/// 在临时目录中写好产物，返回指向它们的配置
pub fn config_with_artifacts(root: &Path, mode: LoadMode) -> ServerConfig {
    let model_dir = root.join("fake_news_model");
    let tokenizer_path = root.join("tokenizer.json");
    write_model(&model_dir);
    write_tokenizer(&tokenizer_path);
    config_for(model_dir, tokenizer_path, mode)
}

pub fn config_for(model_dir: PathBuf, tokenizer_path: PathBuf, mode: LoadMode) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.artifacts.model_dir = model_dir;
    config.artifacts.tokenizer_path = tokenizer_path;
    config.loading.mode = mode;
    config
}
