use std::{env, net::SocketAddr};

use anyhow::Result;
use chrono_tz::Tz;
use tokio::net::TcpListener;
use workday_ics_core::{parse_timezone, sources::DEFAULT_SHEET_PATH};

use crate::handlers::{AppState, create_app};

/// 服务器配置，从环境变量读取
pub struct ServerConfig {
    pub port: u16,
    pub default_timezone: Tz,
    pub sheet_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        // 端口默认为3000
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .unwrap_or(3000);

        let default_timezone = match env::var("DEFAULT_TIMEZONE") {
            Ok(name) if !name.trim().is_empty() => parse_timezone(&name)?,
            _ => chrono_tz::America::New_York,
        };

        let sheet_path = env::var("WORKSHEET_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SHEET_PATH.to_string());

        Ok(Self {
            port,
            default_timezone,
            sheet_path,
        })
    }
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = AppState {
        http_source: workday_ics_core::sources::HttpWorksheetSource::new(&config.sheet_path)?,
        default_timezone: config.default_timezone,
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!(
        "Workday ICS Server starting on {} (timezone: {})",
        addr,
        config.default_timezone
    );

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
