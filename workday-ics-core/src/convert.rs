use chrono::{DateTime, Utc};

use crate::{
    Result, Schedule, TermRequest, Worksheet, courses_from_rows, ics::IcsGenerator,
    schedule::ScheduleAssembler, sheet::SheetExtractor, sources::WorksheetSource,
};

/// 从工作表组装课程表
pub fn assemble_worksheet(
    worksheet: &Worksheet,
    term: &TermRequest,
    extractor: &SheetExtractor,
    generated_at: DateTime<Utc>,
) -> Result<Schedule> {
    let rows = extractor.extract_worksheet(worksheet)?;
    let courses = courses_from_rows(&rows);
    tracing::info!("工作表中共有 {} 门课程", courses.len());

    ScheduleAssembler::assemble(term, courses, generated_at)
}

/// 工作表 -> ICS，纯函数，不访问网络
pub fn convert_worksheet(
    worksheet: &Worksheet,
    term: &TermRequest,
    extractor: &SheetExtractor,
    generator: &IcsGenerator,
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let schedule = assemble_worksheet(worksheet, term, extractor, generated_at)?;
    generator.generate(&schedule)
}

/// 完整的转换流程：获取导出文件、解析、筛选并生成ICS
pub struct Converter<'a> {
    source: &'a dyn WorksheetSource,
    extractor: SheetExtractor,
    generator: IcsGenerator,
}

impl<'a> Converter<'a> {
    pub fn new(
        source: &'a dyn WorksheetSource,
        extractor: SheetExtractor,
        generator: IcsGenerator,
    ) -> Self {
        Self {
            source,
            extractor,
            generator,
        }
    }

    /// 获取工作表并组装课程表
    pub async fn schedule(&self, location: &str, term: &TermRequest) -> Result<Schedule> {
        let worksheet = self.source.fetch(location).await?;
        assemble_worksheet(&worksheet, term, &self.extractor, Utc::now())
    }

    /// 生成ICS，返回课程表（用于文件名等）和日历内容
    pub async fn convert(&self, location: &str, term: &TermRequest) -> Result<(Schedule, String)> {
        tracing::info!(
            "开始生成课程表: source={}, 学期={}",
            self.source.name(),
            term.label()
        );

        let schedule = self.schedule(location, term).await?;
        let ics_content = self.generator.generate(&schedule)?;

        Ok((schedule, ics_content))
    }
}
