use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::{ClockTime, Course, Error, IcsOptions, MeetingPattern, Result, TermRequest};

/// 课程重复规则（每周）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    /// 星期几 (BYDAY)，按UTC日期计算，与 UTC 的 DTSTART 一致
    pub by_day: Vec<Weekday>,
    /// 结束时间 (UNTIL)
    pub until: Option<DateTime<Utc>>,
}

/// 渲染前的日历事件，只在生成ICS时存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    /// 第一次上课的开始时间
    pub start: DateTime<Utc>,
    /// 第一次上课的结束时间
    pub end: DateTime<Utc>,
    pub location: String,
    pub description: String,
    pub recurrence: RecurrenceRule,
}

/// 星期序号，周日为0，周六为6
pub fn weekday_ordinal(day: Weekday) -> u32 {
    day.num_days_from_sunday()
}

/// 从学期开始日期（含）向后查找第一个上课日
pub fn first_occurrence(start: NaiveDate, days: &[Weekday]) -> Result<NaiveDate> {
    if days.is_empty() {
        return Err(Error::NoMeetingDays);
    }

    let ordinals: Vec<u32> = days.iter().map(|day| weekday_ordinal(*day)).collect();

    start
        .iter_days()
        .take(7)
        .find(|date| ordinals.contains(&weekday_ordinal(date.weekday())))
        .ok_or(Error::NoMeetingDays)
}

/// 把时区内的本地时间换算为UTC
///
/// 夏令时回拨造成的重复时间取较早的一个，夏令时跳过的时间返回错误。
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, timezone: Tz) -> Result<DateTime<Utc>> {
    let local = date.and_time(time);

    timezone
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidLocalTime {
            time: local,
            timezone: timezone.name().to_string(),
        })
}

fn clock_to_utc(date: NaiveDate, clock: ClockTime, timezone: Tz) -> Result<DateTime<Utc>> {
    local_to_utc(date, clock.to_naive_time(), timezone)
}

/// 把本地上课日平移到UTC日期上
///
/// DTSTART 以UTC写出时，BYDAY 也按UTC展开。晚上的课在UTC里可能已经是第二天
/// （东边的时区则可能是前一天），星期要跟着移动。
pub fn utc_weekdays(
    days: &[Weekday],
    local_date: NaiveDate,
    utc_start: DateTime<Utc>,
) -> Vec<Weekday> {
    let offset = (utc_start.date_naive() - local_date).num_days().rem_euclid(7);
    days.iter()
        .map(|day| (0..offset).fold(*day, |d, _| d.succ()))
        .collect()
}

/// 构建课程描述，例如 "Lecture | In-Person | Instructor: Ada Lovelace"
pub fn build_description(course: &Course) -> String {
    format!(
        "{} | {} | Instructor: {}",
        course.format, course.mode_of_delivery, course.instructor
    )
}

/// 为单门课程生成一个每周重复的事件
pub fn build_event(
    course: &Course,
    pattern: &MeetingPattern,
    term: &TermRequest,
    options: &IcsOptions,
) -> Result<CalendarEvent> {
    let first_day = first_occurrence(term.start_date, &pattern.days)?;
    let start = clock_to_utc(first_day, pattern.start, options.timezone)?;
    let end = clock_to_utc(first_day, pattern.end, options.timezone)?;

    let until = if options.bound_by_term_end {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Some(local_to_utc(term.end_date, last_second, options.timezone)?)
    } else {
        None
    };

    tracing::debug!(
        "课程 {} 第一次上课: {} ({} - {} UTC)",
        course.title,
        first_day,
        start,
        end
    );

    Ok(CalendarEvent {
        title: course.title.clone(),
        start,
        end,
        location: course.location.clone(),
        description: build_description(course),
        recurrence: RecurrenceRule {
            by_day: utc_weekdays(&pattern.days, first_day, start),
            until,
        },
    })
}
