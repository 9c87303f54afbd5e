use dotenv::dotenv;
use std::env;

/// Typed view over the configuration keys described in the engine's
/// external-interfaces contract. Loaded once at startup; cheap to clone
/// and shared via `web::Data`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub database_url: String,

    pub base_lots: u32,
    pub max_per_trade_loss: f64,
    pub max_daily_loss: f64,

    pub confidence_floor: f64,
    pub confidence_ceiling: f64,

    pub market_open: String,
    pub market_close: String,

    pub cadence_seconds: u64,
    pub level_validity_seconds: u64,
    pub retention_days: i64,

    pub broker_client_id: String,
    pub broker_api_key: String,
    pub broker_api_secret: String,
    pub broker_ws_host: String,
    pub broker_rest_base: String,

    pub symbols: Vec<SymbolConfig>,
}

#[derive(Debug, Clone)]
pub struct SymbolConfig {
    pub symbol: String,
    pub security_id: String,
    pub lot_size: u32,
    pub strike_step: f64,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok();

        let server_port = env_or("SERVER_PORT", "8080").parse::<u16>()
            .map_err(|_| "SERVER_PORT must be a valid u16")?;
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".into());

        let base_lots = env_or("BASE_LOTS", "1").parse::<u32>()
            .map_err(|_| "BASE_LOTS must be an integer")?;
        let max_per_trade_loss = env_or("MAX_PER_TRADE_LOSS", "2000").parse::<f64>()
            .map_err(|_| "MAX_PER_TRADE_LOSS must be numeric")?;
        let max_daily_loss = env_or("MAX_DAILY_LOSS", "6000").parse::<f64>()
            .map_err(|_| "MAX_DAILY_LOSS must be numeric")?;

        let confidence_floor = env_or("CONFIDENCE_FLOOR", "60").parse::<f64>()
            .map_err(|_| "CONFIDENCE_FLOOR must be numeric")?;
        let confidence_ceiling = env_or("CONFIDENCE_CEILING", "75").parse::<f64>()
            .map_err(|_| "CONFIDENCE_CEILING must be numeric")?;

        let market_open = env_or("MARKET_OPEN", "09:15");
        let market_close = env_or("MARKET_CLOSE", "15:30");

        let cadence_seconds = env_or("CADENCE_SECONDS", "900").parse::<u64>()
            .map_err(|_| "CADENCE_SECONDS must be an integer")?;
        let level_validity_seconds = env_or("LEVEL_VALIDITY_SECONDS", "900").parse::<u64>()
            .map_err(|_| "LEVEL_VALIDITY_SECONDS must be an integer")?;
        let retention_days = env_or("RETENTION_DAYS", "30").parse::<i64>()
            .map_err(|_| "RETENTION_DAYS must be an integer")?;

        let broker_client_id = env::var("BROKER_CLIENT_ID").unwrap_or_default();
        let broker_api_key = env::var("BROKER_API_KEY").unwrap_or_default();
        let broker_api_secret = env::var("BROKER_API_SECRET").unwrap_or_default();
        let broker_ws_host = env_or("BROKER_WS_HOST", "api.brokerfeed.example.com");
        let broker_rest_base = env_or("BROKER_REST_BASE", "https://api.brokerfeed.example.com");

        let symbols = vec![
            SymbolConfig {
                symbol: "NIFTY".into(),
                security_id: env_or("NIFTY_SECURITY_ID", "13"),
                lot_size: env_or("NIFTY_LOT_SIZE", "65").parse().unwrap_or(65),
                strike_step: 50.0,
            },
            SymbolConfig {
                symbol: "SENSEX".into(),
                security_id: env_or("SENSEX_SECURITY_ID", "51"),
                lot_size: env_or("SENSEX_LOT_SIZE", "20").parse().unwrap_or(20),
                strike_step: 100.0,
            },
        ];

        Ok(Self {
            server_port,
            database_url,
            base_lots,
            max_per_trade_loss,
            max_daily_loss,
            confidence_floor,
            confidence_ceiling,
            market_open,
            market_close,
            cadence_seconds,
            level_validity_seconds,
            retention_days,
            broker_client_id,
            broker_api_key,
            broker_api_secret,
            broker_ws_host,
            broker_rest_base,
            symbols,
        })
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol.eq_ignore_ascii_case(name))
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
