use std::fs;

use anyhow::Result;
use workday_ics_core::{Error, prelude::*};

/// 生成课程表命令参数
pub struct GenerateParams {
    pub input: String,
    pub term: String,
    pub start: String,
    pub end: String,
    pub timezone: String,
    pub output: Option<String>,
    pub calendar_name: Option<String>,
    pub reminder_minutes: Option<u32>,
    pub until_term_end: bool,
    pub namespace: String,
    pub sheet: String,
}

/// 生成课程表命令
pub async fn generate_command(params: GenerateParams) -> Result<()> {
    let term = TermRequest::from_strs(&params.term, &params.start, &params.end)?;
    let timezone = parse_timezone(&params.timezone)?;

    tracing::info!(
        "开始生成课程表: 输入={}, 学期={}, {} ~ {}, 时区={}",
        params.input,
        term.label(),
        term.start_date,
        term.end_date,
        timezone
    );

    let source = source_for(&params.input, &params.sheet)?;
    let extractor = SheetExtractor::new(ExtractorConfig {
        namespace: params.namespace,
    });
    let options = IcsOptions {
        calendar_name: params
            .calendar_name
            .or_else(|| Some(term.label())),
        timezone,
        reminder_minutes: params.reminder_minutes,
        bound_by_term_end: params.until_term_end,
        ..Default::default()
    };

    println!("读取导出文件...");
    let converter = Converter::new(source.as_ref(), extractor, IcsGenerator::new(options));
    let (schedule, ics_content) = match converter.convert(&params.input, &term).await {
        Ok(result) => result,
        Err(Error::NoMatchingCourses { term }) => {
            return Err(anyhow::anyhow!("没有找到 {} Term 的课程", term));
        }
        Err(Error::NoScheduledCourses { term }) => {
            return Err(anyhow::anyhow!("{} Term 的课程都没有固定上课时间", term));
        }
        Err(e) => return Err(e.into()),
    };
    println!("✓ 找到 {} 门 {} 课程", schedule.courses.len(), schedule.label);

    // 确定输出文件名
    let output_file = params.output.unwrap_or_else(|| schedule.file_name());

    // 写入文件
    fs::write(&output_file, ics_content)?;
    println!("✓ ICS文件已保存到: {}", output_file);

    Ok(())
}

/// 列出课程命令
pub async fn courses_command(
    input: String,
    term: Option<String>,
    json: bool,
    sheet: String,
) -> Result<()> {
    let source = source_for(&input, &sheet)?;
    let worksheet = source.fetch(&input).await?;
    let rows = SheetExtractor::default().extract_worksheet(&worksheet)?;

    // 检查缺少必填列的行（行号从1开始，包含表头）
    for (index, row) in rows.iter().enumerate().skip(1) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if let Err(e) = Course::try_from_row(row) {
            tracing::warn!("第 {} 行: {}", index + 1, e);
        }
    }

    let letter = term
        .as_deref()
        .map(|t| {
            let mut chars = t.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) => Ok(letter),
                _ => Err(anyhow::anyhow!("无效的学期字母: {}", t)),
            }
        })
        .transpose()?;

    let courses: Vec<Course> = courses_from_rows(&rows)
        .into_iter()
        .filter(|course| letter.is_none_or(|l| term_matches(&course.term, l)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&courses)?);
        return Ok(());
    }

    if courses.is_empty() {
        println!("  暂无课程");
        return Ok(());
    }

    println!("共 {} 门课程:", courses.len());
    for course in &courses {
        println!("  {} [{}]", course.title, course.term);
        if course.is_unscheduled() {
            println!("    时间: 无固定上课时间");
        } else {
            match course.meeting_pattern.parse::<MeetingPattern>() {
                Ok(pattern) => println!("    时间: {}", pattern),
                Err(e) => println!("    时间: {} (无法解析: {})", course.meeting_pattern, e),
            }
        }
        if !course.location.is_empty() {
            println!("    地点: {}", course.location);
        }
        if !course.instructor.is_empty() {
            println!("    教师: {}", course.instructor);
        }
    }

    Ok(())
}

/// 解析上课时间命令
pub fn pattern_command(raw: &str) -> Result<()> {
    let pattern = parse_meeting_pattern(raw)?;
    let codes: Vec<&str> = pattern.days.iter().map(|d| weekday_code(*d)).collect();

    println!("原始: {}", raw);
    println!("星期: {}", codes.join(","));
    println!(
        "时间: {:02}:{:02} - {:02}:{:02}",
        pattern.start.hour, pattern.start.minute, pattern.end.hour, pattern.end.minute
    );
    println!("标准: {}", pattern);
    tracing::debug!("解析结果: {:?}", pattern);

    Ok(())
}
