use async_trait::async_trait;

use super::{WorksheetSource, worksheet_from_bytes};
use crate::{Error, Result, Worksheet};

/// 从本地读取 .xlsx 导出文件或单独的工作表XML
#[derive(Debug, Clone)]
pub struct FileWorksheetSource {
    sheet_path: String,
}

impl FileWorksheetSource {
    pub fn new(sheet_path: impl Into<String>) -> Self {
        Self {
            sheet_path: sheet_path.into(),
        }
    }
}

#[async_trait]
impl WorksheetSource for FileWorksheetSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, location: &str) -> Result<Worksheet> {
        tracing::info!("读取导出文件: {}", location);

        let bytes = tokio::fs::read(location).await.map_err(|e| Error::Source {
            source_name: self.name().to_string(),
            message: format!("无法读取 {}: {}", location, e),
        })?;

        worksheet_from_bytes(&bytes, &self.sheet_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DEFAULT_SHEET_PATH, tests::build_xlsx};

    #[tokio::test]
    async fn test_fetch_xlsx_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "workday-ics-file-source-{}.xlsx",
            std::process::id()
        ));
        let bytes = build_xlsx(&[(DEFAULT_SHEET_PATH, "<worksheet/>")]);
        tokio::fs::write(&path, bytes).await.unwrap();

        let source = FileWorksheetSource::new(DEFAULT_SHEET_PATH);
        let worksheet = source.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(worksheet.sheet_xml, "<worksheet/>");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = FileWorksheetSource::new(DEFAULT_SHEET_PATH);
        let result = source.fetch("/nonexistent/workday-export.xlsx").await;
        assert!(matches!(result, Err(Error::Source { .. })));
    }
}
