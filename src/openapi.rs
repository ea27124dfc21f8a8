use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MyYard API",
        version = "1.0.0",
        description = "Backend API for MyYard - township rental marketplace",
        contact(
            name = "MyYard Team",
            email = "support@myyard.co.za"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "auth", description = "Email verification and tokens"),
        (name = "users", description = "Own profile"),
        (name = "properties", description = "Listings"),
        (name = "applications", description = "Rental applications and landlord decisions"),
        (name = "viewings", description = "Viewing requests"),
        (name = "leases", description = "Lease terms, signatures and cancellation"),
        (name = "messages", description = "Landlord and tenant messaging"),
        (name = "notifications", description = "In-app notifications"),
        (name = "payments", description = "Rent and move-in payments"),
        (name = "favorites", description = "Saved properties")
    ),
    paths(
        // Auth
        crate::api::auth::send_verification,
        crate::api::auth::verify_email,
        crate::api::auth::refresh_token,
        crate::api::auth::logout,
        // Users
        crate::api::users::get_me,
        crate::api::users::update_me,
        // Properties
        crate::api::properties::list_properties,
        crate::api::properties::get_property,
        crate::api::properties::my_properties,
        crate::api::properties::create_property,
        crate::api::properties::update_property,
        // Applications
        crate::api::applications::list_applications,
        crate::api::applications::submit_application,
        crate::api::applications::get_application,
        crate::api::applications::schedule_viewing,
        crate::api::applications::approve_application,
        crate::api::applications::reject_application,
        // Viewings
        crate::api::viewings::list_viewings,
        crate::api::viewings::request_viewing,
        crate::api::viewings::confirm_viewing,
        crate::api::viewings::decline_viewing,
        crate::api::viewings::complete_viewing,
        crate::api::viewings::cancel_viewing,
        crate::api::viewings::accept_viewing,
        crate::api::viewings::tenant_decline_viewing,
        // Leases
        crate::api::leases::list_leases,
        crate::api::leases::get_lease,
        crate::api::leases::create_lease,
        crate::api::leases::sign_lease,
        crate::api::leases::cancel_lease,
        crate::api::leases::unlist_property,
        crate::api::leases::relist_property,
        // Messages
        crate::api::messages::list_conversations,
        crate::api::messages::list_contacts,
        crate::api::messages::can_message,
        crate::api::messages::send_message,
        crate::api::messages::mark_as_read,
        // Notifications
        crate::api::notifications::list_notifications,
        crate::api::notifications::mark_as_read,
        crate::api::notifications::mark_all_as_read,
        crate::api::notifications::get_unread_count,
        // Payments
        crate::api::payments::record_payment,
        crate::api::payments::list_payments,
        crate::api::payments::confirm_payment,
        crate::api::payments::mark_overdue,
        crate::api::payments::move_in_breakdown,
        // Favorites
        crate::api::favorites::list_favorites,
        crate::api::favorites::toggle_favorite,
    ),
    components(
        schemas(
            // Auth & users
            crate::models::UserRole,
            crate::models::ProfilePublic,
            crate::models::SendVerificationRequest,
            crate::models::VerifyEmailRequest,
            crate::models::AuthResponse,
            crate::models::RefreshTokenRequest,
            crate::models::TokenResponse,
            crate::models::UpdateProfileRequest,
            crate::api::auth::SendVerificationResponse,
            crate::api::auth::LogoutResponse,
            // Properties
            crate::models::Property,
            crate::models::PropertyStatus,
            crate::models::CreatePropertyRequest,
            crate::models::UpdatePropertyRequest,
            // Applications
            crate::models::Application,
            crate::models::ApplicationStatus,
            crate::models::ApplicationResponse,
            crate::models::CreateApplicationRequest,
            crate::models::ScheduleViewingRequest,
            crate::models::RejectApplicationRequest,
            crate::api::applications::ApprovalResponse,
            crate::api::applications::ScheduledViewingResponse,
            // Viewings
            crate::models::ViewingRequest,
            crate::models::ViewingStatus,
            crate::models::CreateViewingRequest,
            crate::models::LandlordViewingActionRequest,
            crate::models::TenantDeclineViewingRequest,
            // Leases
            crate::models::Lease,
            crate::models::LeaseResponse,
            crate::models::CreateLeaseRequest,
            crate::models::MoveInBreakdown,
            crate::lifecycle::LeaseState,
            crate::lifecycle::LeaseConfig,
            crate::lifecycle::LeaseConfigInput,
            crate::lifecycle::ExtraCharge,
            crate::lifecycle::PropertyOptions,
            crate::lifecycle::CancellationPolicy,
            // Messages
            crate::models::Message,
            crate::models::MessageType,
            crate::models::Conversation,
            crate::models::MessagingGateResponse,
            crate::models::SendMessageRequest,
            crate::services::UnlockReason,
            // Notifications
            crate::models::NotificationType,
            crate::models::NotificationResponse,
            // Payments
            crate::models::Payment,
            crate::models::PaymentStatus,
            crate::models::PaymentType,
            crate::models::CreatePaymentRequest,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}
