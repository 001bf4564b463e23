pub mod gemini_client;
pub mod gemini_client_error;
pub mod quiz_api_client;
