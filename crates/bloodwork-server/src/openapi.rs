use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bloodwork API",
        version = "0.1.0",
        description = "Lab report extraction into longitudinal patient records."
    ),
    paths(
        crate::routes::create_report,
        crate::routes::list_jobs,
        crate::routes::get_job,
        crate::routes::list_patients,
        crate::routes::get_patient,
        crate::routes::get_trends,
        crate::routes::get_analysis,
        crate::routes::stream_analysis,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CreateReportRequest,
        crate::dto::CreateReportResponse,
        crate::dto::JobResponse,
        crate::dto::JobListResponse,
        crate::dto::PatientSummaryResponse,
        crate::dto::PatientListResponse,
        crate::dto::PatientResponse,
        crate::dto::TrendPointResponse,
        crate::dto::TrendSeriesResponse,
        crate::dto::TrendsResponse,
        crate::dto::AnalysisResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "reports", description = "Report upload"),
        (name = "jobs", description = "Extraction job progress"),
        (name = "patients", description = "Patient records and lab trends"),
        (name = "analysis", description = "Model-written analysis of a patient's record"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
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
                            "Server API key. Set via BLOODWORK_SERVER_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
