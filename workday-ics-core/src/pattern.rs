//! 上课时间串解析
//!
//! Workday 导出中的上课时间形如 `M-W-F|9:00 AM - 9:50 AM`：
//! 竖线前是用短横线连接的星期字母，竖线后是开始和结束时间。

use std::{fmt, str::FromStr};

use chrono::Weekday;

use crate::{ClockTime, Error, MeetingPattern, Result};

/// 星期字母表，R 表示周四，U 表示周日
const DAY_LETTERS: [(char, Weekday); 7] = [
    ('M', Weekday::Mon),
    ('T', Weekday::Tue),
    ('W', Weekday::Wed),
    ('R', Weekday::Thu),
    ('F', Weekday::Fri),
    ('S', Weekday::Sat),
    ('U', Weekday::Sun),
];

pub fn weekday_from_letter(letter: char) -> Option<Weekday> {
    DAY_LETTERS
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, day)| *day)
}

pub fn weekday_letter(day: Weekday) -> char {
    DAY_LETTERS
        .iter()
        .find(|(_, d)| *d == day)
        .map_or('?', |(letter, _)| *letter)
}

/// iCalendar BYDAY 使用的两字母代码
pub const fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn weekday_from_code(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// 解析完整的上课时间串
pub fn parse_meeting_pattern(raw: &str) -> Result<MeetingPattern> {
    let mut halves = raw.split('|').map(str::trim);
    let (Some(days_part), Some(time_part), None) = (halves.next(), halves.next(), halves.next())
    else {
        return Err(Error::pattern(raw, "expected exactly one '|' separator"));
    };

    let days = parse_days(raw, days_part)?;

    let mut times = time_part.split('-').map(str::trim);
    let (Some(start), Some(end), None) = (times.next(), times.next(), times.next()) else {
        return Err(Error::pattern(raw, "expected a time range like '9:00 AM - 9:50 AM'"));
    };

    let start = parse_clock(raw, start)?;
    let end = parse_clock(raw, end)?;

    if end <= start {
        return Err(Error::pattern(
            raw,
            format!("end time {} is not after start time {}", end, start),
        ));
    }

    Ok(MeetingPattern { days, start, end })
}

fn parse_days(raw: &str, days_part: &str) -> Result<Vec<Weekday>> {
    days_part
        .split('-')
        .map(str::trim)
        .map(|token| {
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), None) => weekday_from_letter(letter.to_ascii_uppercase())
                    .ok_or_else(|| Error::pattern(raw, format!("unknown day letter '{}'", token))),
                (None, _) => Err(Error::pattern(raw, "empty day letter")),
                _ => Err(Error::pattern(raw, format!("unknown day letter '{}'", token))),
            }
        })
        .collect()
}

/// 解析单个时间，例如 "1:30 PM" 或 "13:30"
pub fn parse_clock(raw: &str, token: &str) -> Result<ClockTime> {
    let mut parts = token.split(' ');
    let (Some(clock), meridiem, None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::pattern(raw, format!("malformed time '{}'", token)));
    };

    let Some((hour, minute)) = clock.split_once(':') else {
        return Err(Error::pattern(raw, format!("malformed time '{}'", token)));
    };

    let number = |value: &str| {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::pattern(raw, format!("malformed time '{}'", token)));
        }
        value
            .parse::<u32>()
            .map_err(|_| Error::pattern(raw, format!("malformed time '{}'", token)))
    };

    let mut hour = number(hour)?;
    let minute = number(minute)?;

    match meridiem.map(str::to_ascii_uppercase).as_deref() {
        Some(m @ ("AM" | "PM")) => {
            if !(1..=12).contains(&hour) {
                return Err(Error::pattern(
                    raw,
                    format!("hour {} is out of range for a 12-hour time", hour),
                ));
            }
            if m == "PM" && hour != 12 {
                hour += 12;
            } else if m == "AM" && hour == 12 {
                hour = 0;
            }
        }
        Some(other) => {
            return Err(Error::pattern(raw, format!("unknown meridiem '{}'", other)));
        }
        None => {}
    }

    ClockTime::new(hour, minute)
        .ok_or_else(|| Error::pattern(raw, format!("time '{}' is out of range", token)))
}

impl FromStr for MeetingPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_meeting_pattern(s)
    }
}

impl fmt::Display for MeetingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self
            .days
            .iter()
            .map(|day| weekday_letter(*day).to_string())
            .collect();
        write!(f, "{}|{} - {}", days.join("-"), self.start, self.end)
    }
}
