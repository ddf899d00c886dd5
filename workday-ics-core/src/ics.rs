use uuid::Uuid;

use crate::{
    Course, Error, IcsOptions, Result, Schedule,
    pattern::{parse_meeting_pattern, weekday_code},
    recurrence::{CalendarEvent, RecurrenceRule, build_event},
};


const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// ICS日历生成器
pub struct IcsGenerator {
    options: IcsOptions,
}

impl IcsGenerator {
    pub fn new(options: IcsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IcsOptions {
        &self.options
    }

    /// 生成ICS日历内容
    pub fn generate(&self, schedule: &Schedule) -> Result<String> {
        let mut ics_content = String::new();

        // ICS文件头部
        ics_content.push_str("BEGIN:VCALENDAR\r\n");
        ics_content.push_str("VERSION:2.0\r\n");
        ics_content.push_str(&format!(
            "PRODID:{}\r\n",
            single_line("PRODID", &self.options.product_id)?
        ));
        ics_content.push_str("CALSCALE:GREGORIAN\r\n");
        ics_content.push_str("METHOD:PUBLISH\r\n");

        if let Some(ref name) = self.options.calendar_name {
            ics_content.push_str(&format!(
                "X-WR-CALNAME:{}\r\n",
                self.escape_text(single_line("X-WR-CALNAME", name)?)
            ));
        }

        ics_content.push_str(&format!(
            "X-WR-TIMEZONE:{}\r\n",
            self.options.timezone.name()
        ));

        // 添加课程事件
        let mut event_count = 0usize;
        for course in &schedule.courses {
            if course.is_unscheduled() {
                tracing::warn!("课程 {} 没有固定上课时间，跳过", course.title);
                continue;
            }

            let event = self.course_event(schedule, course)?;
            self.add_event(&mut ics_content, schedule, course, &event);
            event_count += 1;
        }

        // 课程全部没有上课时间时不输出空日历
        if event_count == 0 {
            tracing::warn!("{} 中没有可以生成事件的课程", schedule.label);
            return Err(Error::NoScheduledCourses {
                term: schedule.term.letter,
            });
        }

        // ICS文件尾部
        ics_content.push_str("END:VCALENDAR\r\n");

        tracing::info!("生成 {} 个课程事件", event_count);
        Ok(ics_content)
    }

    /// 解析上课时间并计算第一次上课的事件
    pub fn course_event(&self, schedule: &Schedule, course: &Course) -> Result<CalendarEvent> {
        let pattern = parse_meeting_pattern(&course.meeting_pattern).map_err(|e| match e {
            Error::MeetingPattern { pattern, reason } => Error::MeetingPattern {
                pattern,
                reason: format!("{} (course: {})", reason, course.title),
            },
            other => other,
        })?;

        build_event(course, &pattern, &schedule.term, &self.options)
    }

    /// 添加单个课程事件
    fn add_event(
        &self,
        ics_content: &mut String,
        schedule: &Schedule,
        course: &Course,
        event: &CalendarEvent,
    ) {
        ics_content.push_str("BEGIN:VEVENT\r\n");
        ics_content.push_str(&format!("UID:{}\r\n", event_uid(schedule, course)));
        ics_content.push_str(&format!(
            "DTSTAMP:{}\r\n",
            schedule.generated_at.format(UTC_FORMAT)
        ));
        ics_content.push_str(&format!("DTSTART:{}\r\n", event.start.format(UTC_FORMAT)));
        ics_content.push_str(&format!("DTEND:{}\r\n", event.end.format(UTC_FORMAT)));
        ics_content.push_str(&format!("SUMMARY:{}\r\n", self.escape_text(&event.title)));
        ics_content.push_str(&format!(
            "LOCATION:{}\r\n",
            self.escape_text(&event.location)
        ));

        if self.options.include_description {
            ics_content.push_str(&format!(
                "DESCRIPTION:{}\r\n",
                self.escape_text(&event.description)
            ));
        }

        // 添加提醒
        if let Some(reminder_minutes) = self.options.reminder_minutes {
            ics_content.push_str("BEGIN:VALARM\r\n");
            ics_content.push_str("ACTION:DISPLAY\r\n");
            ics_content.push_str(&format!(
                "DESCRIPTION:{}\r\n",
                self.escape_text(&event.title)
            ));
            ics_content.push_str(&format!("TRIGGER:-PT{}M\r\n", reminder_minutes));
            ics_content.push_str("END:VALARM\r\n");
        }

        ics_content.push_str(&format!("{}\r\n", recurrence_line(&event.recurrence)));
        ics_content.push_str("END:VEVENT\r\n");
    }

    /// 转义ICS文本内容
    fn escape_text(&self, text: &str) -> String {
        text.replace('\\', "\\\\")
            .replace("\r\n", "\\n")
            .replace('\n', "\\n")
            .replace('\r', "")
            .replace(',', "\\,")
            .replace(';', "\\;")
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default())
    }
}

/// 生成 RRULE 行
pub fn recurrence_line(recurrence: &RecurrenceRule) -> String {
    let mut rrule = String::from("RRULE:FREQ=WEEKLY");

    if let Some(until) = recurrence.until {
        rrule.push_str(&format!(";UNTIL={}", until.format(UTC_FORMAT)));
    }

    let days: Vec<&str> = recurrence.by_day.iter().map(|d| weekday_code(*d)).collect();
    if !days.is_empty() {
        rrule.push_str(&format!(";BYDAY={}", days.join(",")));
    }

    rrule
}

/// 同一课程在多次生成中保持相同的UID，便于日历软件覆盖更新
fn event_uid(schedule: &Schedule, course: &Course) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}|{}",
        schedule.label,
        course.term,
        course.title,
        course.format,
        course.meeting_pattern,
        course.location
    );
    format!(
        "{}@workday-ics",
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    )
}

fn single_line<'a>(property: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        Err(Error::IcsGeneration(format!(
            "{} must not contain line breaks",
            property
        )))
    } else {
        Ok(value)
    }
}
