use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{MAX_WORKSHEET_BYTES, WorksheetSource, worksheet_from_bytes};
use crate::{Error, Result, Worksheet};

/// 通过HTTP下载导出文件
#[derive(Debug, Clone)]
pub struct HttpWorksheetSource {
    client: Client,
    sheet_path: String,
    max_bytes: usize,
}

impl HttpWorksheetSource {
    const NAME: &'static str = "http";

    pub fn new(sheet_path: impl Into<String>) -> Result<Self> {
        Self::with_timeout(sheet_path, 30)
    }

    pub fn with_timeout(sheet_path: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("workday-ics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            sheet_path: sheet_path.into(),
            max_bytes: MAX_WORKSHEET_BYTES,
        })
    }

    /// 设置下载内容的大小上限
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn too_large(&self) -> Error {
        Error::TooLarge {
            what: "Downloaded export".to_string(),
            limit: self.max_bytes,
        }
    }

    /// 通用的错误处理
    fn handle_error_req(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout
        } else if error.is_request() || error.is_connect() {
            self.custom_error(format!("Request failed: {}", error))
        } else {
            Error::Http(error)
        }
    }

    fn custom_error(&self, message: impl Into<String>) -> Error {
        Error::Source {
            source_name: Self::NAME.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl WorksheetSource for HttpWorksheetSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, location: &str) -> Result<Worksheet> {
        tracing::info!("下载导出文件: {}", location);

        let mut response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| self.handle_error_req(e))?;

        if !response.status().is_success() {
            return Err(self.custom_error(format!(
                "获取导出文件失败: HTTP {}",
                response.status()
            )));
        }

        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes as u64)
        {
            return Err(self.too_large());
        }

        // 分块读取，服务端未声明长度时同样受上限约束
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.handle_error_req(e))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        tracing::debug!("导出文件大小: {} 字节", bytes.len());

        worksheet_from_bytes(&bytes, &self.sheet_path)
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    use super::*;
    use crate::sources::{DEFAULT_SHEET_PATH, tests::build_xlsx};

    /// 在本地随机端口启动一个提供导出文件的服务
    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn export_server() -> Router {
        Router::new()
            .route(
                "/export.xlsx",
                get(|| async { build_xlsx(&[(DEFAULT_SHEET_PATH, "<worksheet/>")]) }),
            )
            .route("/sheet1.xml", get(|| async { "<worksheet/>" }))
            .route(
                "/big.xml",
                get(|| async { format!("<worksheet>{}</worksheet>", " ".repeat(8192)) }),
            )
            .route(
                "/slow.xml",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "<worksheet/>"
                }),
            )
            .route(
                "/missing.xlsx",
                get(|| async { (StatusCode::NOT_FOUND, "not found") }),
            )
    }

    #[tokio::test]
    async fn test_fetch_xlsx_over_http() {
        let base = serve(export_server()).await;
        let source = HttpWorksheetSource::new(DEFAULT_SHEET_PATH).unwrap();

        let worksheet = source
            .fetch(&format!("{}/export.xlsx", base))
            .await
            .unwrap();
        assert_eq!(worksheet.sheet_xml, "<worksheet/>");

        let worksheet = source.fetch(&format!("{}/sheet1.xml", base)).await.unwrap();
        assert_eq!(worksheet, Worksheet::from_sheet_xml("<worksheet/>"));
    }

    #[tokio::test]
    async fn test_not_found_is_source_error() {
        let base = serve(export_server()).await;
        let source = HttpWorksheetSource::new(DEFAULT_SHEET_PATH).unwrap();

        let result = source.fetch(&format!("{}/missing.xlsx", base)).await;
        match result {
            Err(Error::Source {
                source_name,
                message,
            }) => {
                assert_eq!(source_name, "http");
                assert!(message.contains("404"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_body_size_is_limited() {
        let base = serve(export_server()).await;
        let source = HttpWorksheetSource::new(DEFAULT_SHEET_PATH)
            .unwrap()
            .with_max_bytes(1024);

        let result = source.fetch(&format!("{}/big.xml", base)).await;
        assert!(matches!(result, Err(Error::TooLarge { limit: 1024, .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = serve(export_server()).await;
        let source = HttpWorksheetSource::with_timeout(DEFAULT_SHEET_PATH, 1).unwrap();

        let result = source.fetch(&format!("{}/slow.xml", base)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }
}
