pub mod file;
pub mod http;

use std::io::{Cursor, Read, Seek};

use async_trait::async_trait;
use zip::{ZipArchive, result::ZipError};

use crate::{Error, Result, Worksheet};

pub use file::FileWorksheetSource;
pub use http::HttpWorksheetSource;

/// 工作表在 .xlsx 中的默认位置
pub const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";
pub const SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";

/// 下载内容和解压后单个XML文件的大小上限
pub const MAX_WORKSHEET_BYTES: usize = 32 * 1024 * 1024;

/// Fetches the worksheet XML of a registration export.
///
/// Implementations either return the complete worksheet or fail as a unit;
/// nothing downstream ever sees a partial document.
#[async_trait]
pub trait WorksheetSource: Send + Sync {
    /// Source name, used in logs and errors
    fn name(&self) -> &str;

    /// Fetch and unpack the worksheet found at `location`
    async fn fetch(&self, location: &str) -> Result<Worksheet>;
}

/// Pick a source for a location: `http(s)://` goes over the network,
/// anything else is treated as a local path.
pub fn source_for(location: &str, sheet_path: &str) -> Result<Box<dyn WorksheetSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpWorksheetSource::new(sheet_path)?))
    } else {
        Ok(Box::new(FileWorksheetSource::new(sheet_path)))
    }
}

/// 从 .xlsx 压缩包中读取工作表和共享字符串表
pub fn unpack_xlsx(bytes: &[u8], sheet_path: &str) -> Result<Worksheet> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let sheet_xml = read_entry(&mut archive, sheet_path, MAX_WORKSHEET_BYTES)?
        .ok_or_else(|| Error::MissingSheet(sheet_path.to_string()))?;
    let shared_strings_xml = read_entry(&mut archive, SHARED_STRINGS_PATH, MAX_WORKSHEET_BYTES)?;

    Ok(Worksheet {
        sheet_xml,
        shared_strings_xml,
    })
}

/// 根据内容判断是 .xlsx 压缩包还是裸的工作表XML
pub fn worksheet_from_bytes(bytes: &[u8], sheet_path: &str) -> Result<Worksheet> {
    if bytes.starts_with(b"PK") {
        unpack_xlsx(bytes, sheet_path)
    } else {
        let sheet_xml = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Config(format!("Worksheet XML is not valid UTF-8: {}", e)))?;
        Ok(Worksheet::from_sheet_xml(sheet_xml))
    }
}

/// 读取压缩包中的文本文件，解压后超过 `limit` 字节时报错
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: usize,
) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(file) => {
            let mut content = Vec::new();
            // 多读一个字节用来判断是否超限，不信任压缩包里声明的大小
            file.take(limit as u64 + 1).read_to_end(&mut content)?;
            if content.len() > limit {
                return Err(Error::TooLarge {
                    what: format!("Workbook entry {}", name),
                    limit,
                });
            }
            String::from_utf8(content).map(Some).map_err(|e| {
                Error::Config(format!("Workbook entry {} is not valid UTF-8: {}", name, e))
            })
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
