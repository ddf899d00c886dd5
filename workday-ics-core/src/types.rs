use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// SpreadsheetML 默认命名空间
pub const SPREADSHEET_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// 注册表中的列，按导出文件中的固定顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseField {
    Term,
    Title,
    Format,
    MeetingPattern,
    Location,
    Instructor,
    ModeOfDelivery,
}

impl CourseField {
    /// 所有列，按位置排序
    pub const ALL: [Self; 7] = [
        Self::Term,
        Self::Title,
        Self::Format,
        Self::MeetingPattern,
        Self::Location,
        Self::Instructor,
        Self::ModeOfDelivery,
    ];

    /// 构建课程时不能为空的列
    pub const REQUIRED: [Self; 3] = [Self::Term, Self::Title, Self::MeetingPattern];

    pub const fn column(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CourseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Term => "Term",
            Self::Title => "Title",
            Self::Format => "Format",
            Self::MeetingPattern => "Meeting Pattern",
            Self::Location => "Location",
            Self::Instructor => "Instructor",
            Self::ModeOfDelivery => "Mode of Delivery",
        };
        f.write_str(name)
    }
}

/// 一行数据缺少必填列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub missing: Vec<CourseField>,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.missing.iter().map(ToString::to_string).collect();
        write!(f, "missing fields: {}", names.join(", "))
    }
}

impl std::error::Error for RowError {}

/// 课程信息（注册表中的一行）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// 学期标签，例如 "2024 Spring C Term (01/16/2024-03/01/2024)"
    pub term: String,
    /// 课程名称
    pub title: String,
    /// 授课形式 (Lecture, Lab...)
    pub format: String,
    /// 原始上课时间串，例如 "M-W-F|9:00 AM - 9:50 AM"
    pub meeting_pattern: String,
    /// 上课地点
    pub location: String,
    /// 教师姓名
    pub instructor: String,
    /// 授课方式 (In-Person, Online...)
    pub mode_of_delivery: String,
}

impl Course {
    /// 按位置宽松地构建课程，缺少的列视为空字符串
    pub fn from_row(row: &[String]) -> Self {
        let cell = |field: CourseField| row.get(field.column()).cloned().unwrap_or_default();

        Self {
            term: cell(CourseField::Term),
            title: cell(CourseField::Title),
            format: cell(CourseField::Format),
            meeting_pattern: cell(CourseField::MeetingPattern),
            location: cell(CourseField::Location),
            instructor: cell(CourseField::Instructor),
            mode_of_delivery: cell(CourseField::ModeOfDelivery),
        }
    }

    /// 构建课程并检查必填列，返回所有缺失的列
    pub fn try_from_row(row: &[String]) -> std::result::Result<Self, RowError> {
        let course = Self::from_row(row);
        let missing: Vec<CourseField> = CourseField::REQUIRED
            .into_iter()
            .filter(|field| course.field(*field).trim().is_empty())
            .collect();

        if missing.is_empty() {
            Ok(course)
        } else {
            Err(RowError { missing })
        }
    }

    pub fn field(&self, field: CourseField) -> &str {
        match field {
            CourseField::Term => &self.term,
            CourseField::Title => &self.title,
            CourseField::Format => &self.format,
            CourseField::MeetingPattern => &self.meeting_pattern,
            CourseField::Location => &self.location,
            CourseField::Instructor => &self.instructor,
            CourseField::ModeOfDelivery => &self.mode_of_delivery,
        }
    }

    /// 没有固定上课时间（在线/异步课程）
    pub fn is_unscheduled(&self) -> bool {
        self.meeting_pattern.trim().is_empty()
    }
}

/// 丢弃表头并把剩余的行转换为课程，完全空白的行会被跳过
pub fn courses_from_rows(rows: &[Vec<String>]) -> Vec<Course> {
    rows.iter()
        .skip(1)
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| Course::from_row(row))
        .collect()
}

/// 24小时制的时刻
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ClockTime {
    /// 以12小时制输出，与导出文件的写法一致
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hour, meridiem) = match self.hour {
            0 => (12, "AM"),
            1..=11 => (self.hour, "AM"),
            12 => (12, "PM"),
            _ => (self.hour - 12, "PM"),
        };
        write!(f, "{}:{:02} {}", hour, self.minute, meridiem)
    }
}

/// 解析后的上课时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPattern {
    /// 上课的星期，保留原始顺序（不去重）
    pub days: Vec<Weekday>,
    pub start: ClockTime,
    pub end: ClockTime,
}

/// 生成请求中的学期参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRequest {
    /// 学期字母 (A, B, C, D, E...)
    pub letter: char,
    pub start_date: NaiveDate,
    /// 目前只在开启 `bound_by_term_end` 时使用
    pub end_date: NaiveDate,
}

impl TermRequest {
    pub fn new(letter: char, start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if !letter.is_ascii_alphanumeric() {
            return Err(Error::Config(format!(
                "Invalid term letter '{}': expected a single letter such as A",
                letter
            )));
        }

        if end_date < start_date {
            return Err(Error::Config(format!(
                "Term end date {} is before start date {}",
                end_date, start_date
            )));
        }

        Ok(Self {
            letter: letter.to_ascii_uppercase(),
            start_date,
            end_date,
        })
    }

    /// 从命令行/请求中的字符串构建，日期格式为 YYYY-MM-DD
    pub fn from_strs(letter: &str, start_date: &str, end_date: &str) -> Result<Self> {
        let mut chars = letter.trim().chars();
        let (Some(letter), None) = (chars.next(), chars.next()) else {
            return Err(Error::Config(format!(
                "Invalid term letter '{}': expected exactly one character",
                letter
            )));
        };

        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
                Error::Config(format!(
                    "Invalid date format '{}': {}. Expected format: YYYY-MM-DD",
                    value, e
                ))
            })
        };

        Self::new(letter, parse(start_date)?, parse(end_date)?)
    }

    /// 课程表名称，例如 "WPI A Term"
    pub fn label(&self) -> String {
        format!("WPI {} Term", self.letter)
    }
}

/// 某个学期的课程表，组装完成后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub label: String,
    pub term: TermRequest,
    pub courses: Vec<Course>,
    /// 生成时间 (DTSTAMP)
    pub generated_at: DateTime<Utc>,
}

impl Schedule {
    /// 下载文件名，例如 "WPI_A_Term.ics"
    pub fn file_name(&self) -> String {
        let stem: Vec<&str> = self.label.split_whitespace().collect();
        format!("{}.ics", stem.join("_"))
    }
}

/// 数据源返回的工作表内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worksheet {
    /// xl/worksheets/sheet1.xml
    pub sheet_xml: String,
    /// xl/sharedStrings.xml（如果存在）
    pub shared_strings_xml: Option<String>,
}

impl Worksheet {
    pub fn from_sheet_xml(sheet_xml: impl Into<String>) -> Self {
        Self {
            sheet_xml: sheet_xml.into(),
            shared_strings_xml: None,
        }
    }
}

/// 工作表解析配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// 表格元素所在的命名空间
    pub namespace: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            namespace: SPREADSHEET_NAMESPACE.to_string(),
        }
    }
}

/// ICS生成选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcsOptions {
    /// 日历名称
    pub calendar_name: Option<String>,
    /// PRODID
    pub product_id: String,
    /// 上课时间所在的时区，用于换算成UTC
    pub timezone: Tz,
    /// 是否包含课程描述
    pub include_description: bool,
    pub reminder_minutes: Option<u32>,
    /// 是否用学期结束日期作为 RRULE 的 UNTIL
    pub bound_by_term_end: bool,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: None,
            product_id: "-//Workday ICS//Course Calendar//EN".to_string(),
            timezone: chrono_tz::America::New_York,
            include_description: true,
            reminder_minutes: None,
            bound_by_term_end: false,
        }
    }
}

/// 解析 IANA 时区名称，例如 "America/New_York"
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| Error::Config(format!("Invalid timezone '{}': {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_course_from_short_row() {
        let course = Course::from_row(&row(&["A Term", "Calculus I", "Lecture"]));
        assert_eq!(course.term, "A Term");
        assert_eq!(course.title, "Calculus I");
        assert_eq!(course.format, "Lecture");
        assert!(course.meeting_pattern.is_empty());
        assert!(course.mode_of_delivery.is_empty());
        assert!(course.is_unscheduled());
    }

    #[test]
    fn test_course_ignores_extra_columns() {
        let course = Course::from_row(&row(&[
            "A Term",
            "Calculus I",
            "Lecture",
            "M-W-F|9:00 AM - 9:50 AM",
            "SL 104",
            "Ada Lovelace",
            "In-Person",
            "4 credits",
        ]));
        assert_eq!(course.field(CourseField::Location), "SL 104");
        assert_eq!(course.field(CourseField::ModeOfDelivery), "In-Person");
    }

    #[test]
    fn test_try_from_row_lists_missing_fields() {
        let err = Course::try_from_row(&row(&["", "Calculus I"])).unwrap_err();
        assert_eq!(
            err.missing,
            vec![CourseField::Term, CourseField::MeetingPattern]
        );
        assert_eq!(err.to_string(), "missing fields: Term, Meeting Pattern");

        let ok = Course::try_from_row(&row(&["A Term", "Calculus I", "", "T-R|1:00 PM - 2:50 PM"]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_courses_from_rows_drops_header_and_blank_rows() {
        let rows = vec![
            row(&["Term", "Course", "Format"]),
            row(&["A Term", "Calculus I"]),
            row(&["", " ", ""]),
            row(&["B Term", "Physics"]),
        ];
        let courses = courses_from_rows(&rows);
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[1].title, "Physics");
    }

    #[test]
    fn test_term_request_validation() {
        let term = TermRequest::from_strs("a", "2024-01-08", "2024-03-01").unwrap();
        assert_eq!(term.letter, 'A');
        assert_eq!(term.label(), "WPI A Term");

        assert!(TermRequest::from_strs("AB", "2024-01-08", "2024-03-01").is_err());
        assert!(TermRequest::from_strs("", "2024-01-08", "2024-03-01").is_err());
        assert!(TermRequest::from_strs("-", "2024-01-08", "2024-03-01").is_err());
        assert!(TermRequest::from_strs("A", "2024/01/08", "2024-03-01").is_err());
        assert!(TermRequest::from_strs("A", "2024-03-01", "2024-01-08").is_err());
    }

    #[test]
    fn test_clock_time_display() {
        assert_eq!(ClockTime::new(0, 5).unwrap().to_string(), "12:05 AM");
        assert_eq!(ClockTime::new(12, 0).unwrap().to_string(), "12:00 PM");
        assert_eq!(ClockTime::new(13, 30).unwrap().to_string(), "1:30 PM");
        assert!(ClockTime::new(24, 0).is_none());
        assert!(ClockTime::new(10, 60).is_none());
    }

    #[test]
    fn test_schedule_file_name() {
        let schedule = Schedule {
            label: "WPI A Term".to_string(),
            term: TermRequest::from_strs("A", "2024-01-08", "2024-03-01").unwrap(),
            courses: Vec::new(),
            generated_at: Utc::now(),
        };
        assert_eq!(schedule.file_name(), "WPI_A_Term.ics");
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(
            parse_timezone("America/New_York").unwrap(),
            chrono_tz::America::New_York
        );
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
