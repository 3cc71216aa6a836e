//! Backend endpoint paths, relative to the API base URL.

pub const AUTH_LOGIN: &str = "/v1/auth/login";
pub const AUTH_REGISTER: &str = "/v1/auth/register";
pub const AUTH_MFA_COMPLETE: &str = "/v1/auth/mfa/complete";
pub const AUTH_REFRESH: &str = "/v1/auth/refresh";
pub const AUTH_LOGOUT: &str = "/v1/auth/logout";
pub const USERS_ME: &str = "/v1/users/me";
