use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clipper API",
        version = "0.1.0",
        description = "Content clipper: extraction, genre classification, keywords, and Markdown templates."
    ),
    paths(
        crate::routes::scrape,
        crate::routes::clip,
        crate::routes::classify,
        crate::routes::list_templates,
        crate::routes::get_content,
        crate::routes::list_recent,
        crate::routes::list_logs,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ScrapeRequest,
        crate::dto::ClipRequestBody,
        crate::dto::ClipResponse,
        crate::dto::KeywordResponse,
        crate::dto::ClassifyRequest,
        crate::dto::ClassifyResponse,
        crate::dto::VoteResponse,
        crate::dto::TemplateScoreResponse,
        crate::dto::TemplateResponse,
        crate::dto::TemplateListResponse,
        crate::dto::ContentResponse,
        crate::dto::ContentListResponse,
        crate::dto::LogEventResponse,
        crate::dto::LogListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "clips", description = "Clip and classify pages"),
        (name = "templates", description = "Template catalog"),
        (name = "content", description = "Stored clips and event log"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API key. Set via CLIPPER_SERVER_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
