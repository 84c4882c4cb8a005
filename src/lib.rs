pub mod dataset;
mod error;
pub mod model;
mod profile;
pub mod providers;
pub mod runner;
pub mod types;
mod utils;

pub use dataset::{PROMPT_COLUMN, PromptRecord, output_file_name, read_prompts, write_results};
pub use error::{RelayError, Result};
pub use model::CompletionModel;
pub use profile::{
    API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, Env, RelayConfig,
    parse_dotenv,
};
pub use providers::OpenAICompatible;
pub use runner::{RowOutcome, SYSTEM_INSTRUCTION, run_batch};
pub use types::{GenerateRequest, GenerateResponse, Message, Role};
