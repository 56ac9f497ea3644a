use crate::api::attendance::{LocationPayload, RangeQuery};
use crate::api::ledger::{CreateLedgerPayload, LedgerListQuery, UpdateStatusPayload};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::ledger::{LedgerRequest, LedgerStatus};
use crate::model::role::Role;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TradeCRM Core API",
        version = "1.0.0",
        description = r#"
Role-based CRM core for a trading/distribution company.

- **Attendance** - geofenced daily check-in/out with a morning time window
- **Ledger requests** - request -> upload -> confirm workflow with file custody

All endpoints expect a bearer token minted by the external auth provider.
Roles: admin, manager, sales, office, client.
"#,
    ),
    paths(
        crate::api::attendance::start,
        crate::api::attendance::end,
        crate::api::attendance::status,
        crate::api::attendance::history,
        crate::api::attendance::all,

        crate::api::ledger::list,
        crate::api::ledger::create,
        crate::api::ledger::get,
        crate::api::ledger::update_status,
        crate::api::ledger::upload,
        crate::api::ledger::download,
        crate::api::ledger::delete,
    ),
    components(
        schemas(
            LocationPayload,
            RangeQuery,
            AttendanceRecord,
            AttendanceStatus,
            CreateLedgerPayload,
            UpdateStatusPayload,
            LedgerListQuery,
            LedgerRequest,
            LedgerStatus,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Geofenced attendance session APIs"),
        (name = "Ledger", description = "Ledger request lifecycle APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
