//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "whatsrelay".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    8000
}

pub fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

pub fn default_timeout_secs() -> u64 {
    20
}

pub fn default_provider_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

pub fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

pub fn default_temperature() -> f32 {
    0.6
}

pub fn default_max_tokens() -> u32 {
    512
}

pub fn default_max_turns() -> usize {
    10
}

pub fn default_country_code() -> String {
    "55".to_string()
}

pub fn default_local_len() -> usize {
    8
}

pub fn default_prefix_digit() -> char {
    '9'
}
