use chrono::{DateTime, Utc};

use crate::{Course, Error, Result, Schedule, TermRequest};

/// 判断学期标签是否属于指定的学期字母
///
/// 标签按非字母数字字符切分成词，要求出现 `<字母> TERM` 两个连续的词，
/// 因此 "AA Term" 不会被当作 A 学期。
pub fn term_matches(label: &str, letter: char) -> bool {
    let letter = letter.to_ascii_uppercase().to_string();
    let tokens: Vec<String> = label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_uppercase)
        .collect();

    tokens
        .windows(2)
        .any(|pair| pair[0] == letter && pair[1] == "TERM")
}

/// 按学期筛选课程并组装课程表
pub struct ScheduleAssembler;

impl ScheduleAssembler {
    pub fn assemble(
        term: &TermRequest,
        courses: Vec<Course>,
        generated_at: DateTime<Utc>,
    ) -> Result<Schedule> {
        let total = courses.len();
        let courses: Vec<Course> = courses
            .into_iter()
            .filter(|course| term_matches(&course.term, term.letter))
            .collect();

        tracing::info!(
            "{} 学期筛选: {}/{} 门课程",
            term.letter,
            courses.len(),
            total
        );

        if courses.is_empty() {
            return Err(Error::NoMatchingCourses { term: term.letter });
        }

        Ok(Schedule {
            label: term.label(),
            term: term.clone(),
            courses,
            generated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn course(term: &str, title: &str) -> Course {
        Course {
            term: term.to_string(),
            title: title.to_string(),
            meeting_pattern: "M-W-F|9:00 AM - 9:50 AM".to_string(),
            ..Default::default()
        }
    }

    fn term(letter: char) -> TermRequest {
        TermRequest::new(
            letter,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_term_matches() {
        assert!(term_matches("A Term", 'A'));
        assert!(term_matches("a term", 'A'));
        assert!(term_matches("2024 Fall A Term (08/22/2024-10/11/2024)", 'a'));
        assert!(term_matches("2024 Fall - B Term", 'B'));
        assert!(term_matches("(C Term)", 'C'));

        assert!(!term_matches("AA Term", 'A'));
        assert!(!term_matches("A Terms", 'A'));
        assert!(!term_matches("Term A", 'A'));
        assert!(!term_matches("B Term", 'A'));
        assert!(!term_matches("", 'A'));
    }

    #[test]
    fn test_assemble_filters_in_order() {
        let courses = vec![
            course("2024 Fall A Term", "Calculus I"),
            course("2024 Fall AA Term", "Seminar"),
            course("2024 Fall B Term", "Physics"),
            course("2024 Fall a term", "Writing"),
        ];

        let schedule = ScheduleAssembler::assemble(&term('A'), courses, Utc::now()).unwrap();
        assert_eq!(schedule.label, "WPI A Term");
        let titles: Vec<&str> = schedule.courses.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Calculus I", "Writing"]);
    }

    #[test]
    fn test_assemble_without_matches() {
        let courses = vec![course("2024 Fall B Term", "Physics")];
        let result = ScheduleAssembler::assemble(&term('A'), courses, Utc::now());
        assert!(matches!(
            result,
            Err(Error::NoMatchingCourses { term: 'A' })
        ));

        let result = ScheduleAssembler::assemble(&term('A'), Vec::new(), Utc::now());
        assert!(matches!(result, Err(Error::NoMatchingCourses { .. })));
    }
}
