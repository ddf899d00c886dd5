use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use workday_ics_core::{Error, prelude::*};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub http_source: HttpWorksheetSource,
    pub default_timezone: Tz,
}

/// 健康检查响应
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// 错误响应
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// 日历生成请求，`url` 和 `worksheet_xml` 二选一
#[derive(Deserialize)]
pub struct CalendarRequest {
    url: Option<String>,
    worksheet_xml: Option<String>,
    term: String,
    start_date: String, // 格式：YYYY-MM-DD
    end_date: String,
    timezone: Option<String>,
    calendar_name: Option<String>,
    reminder_minutes: Option<u32>,
    #[serde(default)]
    until_term_end: bool,
    namespace: Option<String>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/calendar", post(calendar_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// 根路径处理器
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Workday ICS Calendar Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Converts Workday registration exports into recurring ICS calendars",
        "endpoints": {
            "health": "/health",
            "calendar": "/calendar"
        }
    }))
}

/// 健康检查处理器
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 生成日历处理器
async fn calendar_handler(
    State(state): State<AppState>,
    Json(request): Json<CalendarRequest>,
) -> Result<Response, AppError> {
    let term = TermRequest::from_strs(&request.term, &request.start_date, &request.end_date)?;
    let timezone = request
        .timezone
        .as_deref()
        .map(parse_timezone)
        .transpose()?
        .unwrap_or(state.default_timezone);

    let worksheet = match (request.url, request.worksheet_xml) {
        (Some(url), None) => state.http_source.fetch(&url).await?,
        (None, Some(xml)) => Worksheet::from_sheet_xml(xml),
        _ => {
            return Err(AppError(Error::Config(
                "Exactly one of 'url' or 'worksheet_xml' is required".to_string(),
            )));
        }
    };

    let extractor = SheetExtractor::new(
        request
            .namespace
            .map(|namespace| ExtractorConfig { namespace })
            .unwrap_or_default(),
    );
    let options = IcsOptions {
        calendar_name: request
            .calendar_name
            .or_else(|| Some(term.label())),
        timezone,
        reminder_minutes: request.reminder_minutes,
        bound_by_term_end: request.until_term_end,
        ..Default::default()
    };

    let schedule = assemble_worksheet(&worksheet, &term, &extractor, Utc::now())?;
    let ics_content = IcsGenerator::new(options).generate(&schedule)?;

    tracing::info!(
        "生成 {} 日历: {} 门课程",
        schedule.label,
        schedule.courses.len()
    );

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "text/calendar; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", schedule.file_name()),
            ),
        ],
        ics_content,
    )
        .into_response())
}

/// 应用错误类型
#[derive(Debug)]
pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self.0 {
            Error::NoMatchingCourses { .. } | Error::NoScheduledCourses { .. } => {
                (StatusCode::NOT_FOUND, "没有匹配的课程")
            }
            Error::Config(_) => (StatusCode::BAD_REQUEST, "请求参数错误"),
            Error::MeetingPattern { .. }
            | Error::NoMeetingDays
            | Error::InvalidLocalTime { .. }
            | Error::Xml(_)
            | Error::TooLarge { .. }
            | Error::IcsGeneration(_) => (StatusCode::UNPROCESSABLE_ENTITY, "导出文件无法转换"),
            Error::Source { .. } | Error::Http(_) | Error::Archive(_) | Error::MissingSheet(_) => {
                (StatusCode::BAD_GATEWAY, "获取导出文件失败")
            }
            Error::Timeout => (StatusCode::GATEWAY_TIMEOUT, "请求超时"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "内部服务器错误"),
        };

        if status.is_server_error() {
            tracing::error!("请求失败: {}", self.0);
        } else {
            tracing::warn!("请求失败: {}", self.0);
        }

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        create_app(AppState {
            http_source: HttpWorksheetSource::new(DEFAULT_SHEET_PATH).unwrap(),
            default_timezone: chrono_tz::America::New_York,
        })
    }

    fn worksheet_xml() -> String {
        format!(
            r#"<worksheet xmlns="{}"><sheetData>
                 <row><c t="inlineStr"><is><t>Term</t></is></c></row>
                 <row>
                   <c t="inlineStr"><is><t>2024 Spring C Term</t></is></c>
                   <c t="inlineStr"><is><t>CS 2102 - Object-Oriented Design</t></is></c>
                   <c t="inlineStr"><is><t>Lecture</t></is></c>
                   <c t="inlineStr"><is><t>T-R|1:00 PM - 2:50 PM</t></is></c>
                   <c t="inlineStr"><is><t>Fuller Labs 320</t></is></c>
                   <c t="inlineStr"><is><t>Grace Hopper</t></is></c>
                   <c t="inlineStr"><is><t>In-Person</t></is></c>
                 </row>
               </sheetData></worksheet>"#,
            SPREADSHEET_NAMESPACE
        )
    }

    async fn post_calendar(body: serde_json::Value) -> (StatusCode, String) {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/calendar")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_calendar_from_inline_xml() {
        let (status, body) = post_calendar(serde_json::json!({
            "worksheet_xml": worksheet_xml(),
            "term": "c",
            "start_date": "2024-01-15",
            "end_date": "2024-03-01"
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("SUMMARY:CS 2102 - Object-Oriented Design\r\n"));
        assert!(body.contains("DTSTART:20240116T180000Z\r\n"));
        assert!(body.contains("RRULE:FREQ=WEEKLY;BYDAY=TU,TH\r\n"));
        assert!(body.contains("X-WR-CALNAME:WPI C Term\r\n"));
    }

    #[tokio::test]
    async fn test_calendar_without_matching_term() {
        let (status, body) = post_calendar(serde_json::json!({
            "worksheet_xml": worksheet_xml(),
            "term": "D",
            "start_date": "2024-03-11",
            "end_date": "2024-05-01"
        }))
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("No courses found for D Term"));
    }

    #[tokio::test]
    async fn test_calendar_without_meeting_times() {
        let xml = worksheet_xml().replace("T-R|1:00 PM - 2:50 PM", "");
        let (status, body) = post_calendar(serde_json::json!({
            "worksheet_xml": xml,
            "term": "C",
            "start_date": "2024-01-15",
            "end_date": "2024-03-01"
        }))
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("No scheduled meetings found for C Term"));
    }

    #[tokio::test]
    async fn test_calendar_rejects_oversized_reference_sheet() {
        let xml = format!(
            r#"<worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
            SPREADSHEET_NAMESPACE,
            r#"<row><c r="XFD1"><v>x</v></c></row>"#.repeat(200)
        );
        let (status, _) = post_calendar(serde_json::json!({
            "worksheet_xml": xml,
            "term": "C",
            "start_date": "2024-01-15",
            "end_date": "2024-03-01"
        }))
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_calendar_rejects_bad_parameters() {
        let (status, _) = post_calendar(serde_json::json!({
            "term": "C",
            "start_date": "2024-01-15",
            "end_date": "2024-03-01"
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_calendar(serde_json::json!({
            "worksheet_xml": worksheet_xml(),
            "term": "C",
            "start_date": "15/01/2024",
            "end_date": "2024-03-01"
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_calendar(serde_json::json!({
            "worksheet_xml": worksheet_xml(),
            "term": "C",
            "start_date": "2024-01-15",
            "end_date": "2024-03-01",
            "timezone": "Nowhere/Special"
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
