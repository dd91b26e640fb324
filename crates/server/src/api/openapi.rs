//! OpenAPI/Utoipa configuration.

use crate::api::{health::MISC_TAG, token::TOKEN_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{OAuth2, Password, Scopes, SecurityScheme},
};

/// Documents the password flow served by the token endpoint.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let oauth2 = OAuth2::new([utoipa::openapi::security::Flow::Password(Password::new(
            "/connect/token",
            Scopes::from_iter([
                ("openid", "OpenID Connect scope, adds an id_token"),
                ("profile", "Access to the user's profile"),
                ("email", "Access to the user's email"),
                ("offline_access", "Refresh token usage"),
            ]),
        ))]);
        components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Token Server API",
        version = "1.0.0",
        description = "OAuth2/OpenID Connect token issuance for password and refresh token grants."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = TOKEN_TAG, description = "OAuth2 token endpoint")
    )
)]
pub struct ApiDoc;
