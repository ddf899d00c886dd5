//! SpreadsheetML 工作表解析
//!
//! 只读取 `sheetData` 中的行和单元格文本，不处理样式、公式和合并单元格。

use quick_xml::{
    NsReader,
    events::{BytesStart, Event},
    name::{Namespace, ResolveResult},
};

use crate::{Error, ExtractorConfig, Result, Worksheet};

/// 共享字符串表 (xl/sharedStrings.xml)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStrings {
    strings: Vec<String>,
}

impl SharedStrings {
    pub fn parse(xml: &str, config: &ExtractorConfig) -> Result<Self> {
        let namespace = config.namespace.as_bytes();
        let mut reader = NsReader::from_str(xml);

        let mut strings = Vec::new();
        let mut current: Option<String> = None;
        let mut in_text = false;
        // 注音 (rPh) 中的文本不属于单元格内容
        let mut phonetic_depth = 0usize;

        loop {
            let (ns, event) = reader.read_resolved_event()?;
            let in_ns = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == namespace);

            match event {
                Event::Start(e) if in_ns => match e.local_name().as_ref() {
                    b"si" => current = Some(String::new()),
                    b"rPh" => phonetic_depth += 1,
                    b"t" if current.is_some() && phonetic_depth == 0 => in_text = true,
                    _ => {}
                },
                Event::Empty(e) if in_ns && e.local_name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Event::Text(e) if in_text => {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) if in_text => {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) if in_ns => match e.local_name().as_ref() {
                    b"si" => strings.extend(current.take()),
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_text = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { strings })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    InlineString,
    SharedString,
    Value,
}

#[derive(Debug)]
struct CellState {
    column: Option<usize>,
    kind: CellKind,
    value: String,
    inline: String,
    in_value: bool,
    in_inline: bool,
    in_text: bool,
}

impl CellState {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let mut column = None;
        let mut kind = CellKind::Value;

        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
            match attr.key.local_name().as_ref() {
                b"r" => column = column_index(&attr.unescape_value()?),
                b"t" => {
                    kind = match &*attr.unescape_value()? {
                        "inlineStr" => CellKind::InlineString,
                        "s" => CellKind::SharedString,
                        _ => CellKind::Value,
                    };
                }
                _ => {}
            }
        }

        Ok(Self {
            column,
            kind,
            value: String::new(),
            inline: String::new(),
            in_value: false,
            in_inline: false,
            in_text: false,
        })
    }

    fn push_text(&mut self, text: &str) {
        if self.in_value {
            self.value.push_str(text);
        } else if self.in_text {
            self.inline.push_str(text);
        }
    }

    fn finish(self, shared: Option<&SharedStrings>) -> String {
        match self.kind {
            CellKind::InlineString => self.inline,
            CellKind::SharedString => match shared {
                Some(table) => {
                    let resolved = self
                        .value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| table.get(index));
                    match resolved {
                        Some(text) => text.to_string(),
                        None => {
                            tracing::warn!("共享字符串索引无效: {}", self.value);
                            self.value
                        }
                    }
                }
                None => self.value,
            },
            CellKind::Value => self.value,
        }
    }
}

/// 工作表最大列号 (XFD)
pub const MAX_COLUMN: usize = 16_383;

/// 单个工作表最多保留的单元格数（含补齐的空单元格）
pub const MAX_SHEET_CELLS: usize = 2_000_000;

/// 把单元格引用（如 "C5"）转换为从0开始的列号，超出 XFD 的引用返回 None
pub fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .map(|b| b.to_ascii_uppercase())
        .collect();

    if letters.is_empty() {
        return None;
    }

    letters
        .iter()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add(usize::from(b - b'A') + 1)
        })
        .map(|n| n - 1)
        .filter(|column| *column <= MAX_COLUMN)
}

fn place_cell(row: &mut Vec<String>, column: Option<usize>, text: String) {
    if let Some(column) = column {
        if column > row.len() {
            row.resize(column, String::new());
        }
    }
    row.push(text);
}

/// 工作表行提取器
#[derive(Debug, Clone, Default)]
pub struct SheetExtractor {
    config: ExtractorConfig,
}

impl SheetExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// 提取工作表，存在共享字符串表时一并解析
    pub fn extract_worksheet(&self, worksheet: &Worksheet) -> Result<Vec<Vec<String>>> {
        let shared = worksheet
            .shared_strings_xml
            .as_deref()
            .map(|xml| SharedStrings::parse(xml, &self.config))
            .transpose()?;

        if let Some(ref table) = shared {
            tracing::debug!("共享字符串表包含 {} 项", table.len());
        }

        self.extract_rows(&worksheet.sheet_xml, shared.as_ref())
    }

    /// 按文档顺序提取所有行的单元格文本
    ///
    /// 缺少的节点视为空字符串。没有共享字符串表时，`t="s"` 单元格返回原始索引。
    pub fn extract_rows(
        &self,
        xml: &str,
        shared: Option<&SharedStrings>,
    ) -> Result<Vec<Vec<String>>> {
        let namespace = self.config.namespace.as_bytes();
        let mut reader = NsReader::from_str(xml);

        let mut rows = Vec::new();
        let mut row: Option<Vec<String>> = None;
        let mut cell: Option<CellState> = None;
        let mut cell_count = 0usize;

        loop {
            let (ns, event) = reader.read_resolved_event()?;
            let in_ns = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == namespace);

            match event {
                Event::Start(e) if in_ns => match e.local_name().as_ref() {
                    b"row" => row = Some(Vec::new()),
                    b"c" if row.is_some() => cell = Some(CellState::from_start(&e)?),
                    b"v" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_value = true;
                        }
                    }
                    b"is" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_inline = true;
                        }
                    }
                    b"t" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_text = c.in_inline;
                        }
                    }
                    _ => {}
                },
                Event::Empty(e) if in_ns => match e.local_name().as_ref() {
                    b"row" => rows.push(Vec::new()),
                    b"c" => {
                        if let Some(r) = row.as_mut() {
                            let empty = CellState::from_start(&e)?;
                            place_cell(r, empty.column, String::new());
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    if let Some(c) = cell.as_mut() {
                        c.push_text(&e.unescape()?);
                    }
                }
                Event::CData(e) => {
                    if let Some(c) = cell.as_mut() {
                        c.push_text(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) if in_ns => match e.local_name().as_ref() {
                    b"v" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_value = false;
                        }
                    }
                    b"t" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_text = false;
                        }
                    }
                    b"is" => {
                        if let Some(c) = cell.as_mut() {
                            c.in_inline = false;
                        }
                    }
                    b"c" => {
                        if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                            let column = c.column;
                            place_cell(r, column, c.finish(shared));
                        }
                    }
                    b"row" => {
                        if let Some(r) = row.take() {
                            cell_count += r.len();
                            if cell_count > MAX_SHEET_CELLS {
                                return Err(Error::TooLarge {
                                    what: "Worksheet cell count".to_string(),
                                    limit: MAX_SHEET_CELLS,
                                });
                            }
                            rows.push(r);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        tracing::debug!("工作表解析完成，共 {} 行", rows.len());
        Ok(rows)
    }
}
