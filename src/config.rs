use clap::Parser;
use std::time::Duration;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "gpt-relay-bot")]
#[command(about = "Telegram bot relaying subscriber questions to a text generation backend")]
pub struct Args {
    // Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    // Telegram Bot API base url
    #[arg(long, default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    // OpenAI api key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    // OpenAI api base url
    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub openai_url: String,

    // Completion model
    #[arg(long, default_value = "gpt-3.5-turbo-instruct")]
    pub model: String,

    #[arg(long, default_value_t = 3500)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.5)]
    pub temperature: f32,

    // Subscriber store
    // Example: "sqlite://subscribers.db"
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://subscribers.db")]
    pub database_url: String,

    // Backend timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub backend_timeout: u64,

    // Telegram long poll timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub poll_timeout: u64,

    // Max updates handled concurrently
    #[arg(long, default_value_t = 256)]
    pub max_in_flight: u32,

    // Evict sessions idle for this many seconds (never less than the rate window)
    #[arg(long, default_value_t = 3600)]
    pub session_idle_ttl: u64,

    // Session sweep interval in seconds
    #[arg(long, default_value_t = 300)]
    pub sweep_interval: u64,

    // Admin server address and port
    #[arg(long, default_value = "127.0.0.1")]
    pub admin_bind: String,

    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_secs(self.sweep_interval.max(1))
    }
}
