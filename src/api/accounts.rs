use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{optional, parse_label, required, ApiState};
use crate::error::AppError;
use crate::models::{EmployeeStatus, NewUser, Role, User, UserId};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub username: Option<String>,
    pub image: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            username: u.username.clone(),
            image: u.image.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub msg: String,
    pub user: UserProfile,
}

/// Row shown in the admin agent and staff tables
#[derive(Debug, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub phonenumber: Option<String>,
    pub email: String,
    pub role: Role,
    pub status: EmployeeStatus,
}

impl From<&User> for EmployeeSummary {
    fn from(u: &User) -> Self {
        let (firstname, lastname) = u.split_name();
        Self {
            id: u.id,
            firstname,
            lastname,
            phonenumber: u.phone.clone(),
            email: u.email.clone(),
            role: u.role,
            status: u.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddStaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddStaffResponse {
    pub msg: String,
    pub staff: EmployeeSummary,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub msg: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = required(req.email.as_deref(), "email")?;
    let password = required(req.password.as_deref(), "password")?;
    let role = optional(req.role.as_deref());
    info!(%email, role = role.as_deref().unwrap_or("any"), "Login attempt");

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .filter(|u| match &role {
            Some(r) => u.role.as_str().eq_ignore_ascii_case(r),
            None => true,
        })
        .ok_or_else(|| {
            warn!(%email, "No user found for login");
            AppError::Unauthorized("User not found".to_string())
        })?;

    if !state.hasher.verify(&password, &user.password_hash) {
        warn!(%email, "Incorrect password");
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    Ok(Json(LoginResponse {
        msg: "Login successful".to_string(),
        user: UserProfile::from(&user),
    }))
}

/// Sessions live in client-side storage, so there is nothing to revoke
pub async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn add_staff(
    State(state): State<ApiState>,
    Json(req): Json<AddStaffRequest>,
) -> Result<(StatusCode, Json<AddStaffResponse>), AppError> {
    let name = required(req.name.as_deref(), "name")?;
    let email = required(req.email.as_deref(), "email")?;
    let password = required(req.password.as_deref(), "password")?;

    let role = match optional(req.role.as_deref()) {
        Some(r) => parse_label(Some(r.as_str()), "role")?,
        None => Role::Staff,
    };
    if !role.is_employee() {
        return Err(AppError::bad_request("role must be Admin, Staff or Agent"));
    }

    let user = state
        .users
        .insert_user(NewUser {
            name,
            email,
            phone: optional(req.phone.as_deref()),
            address: optional(req.address.as_deref()),
            username: optional(req.username.as_deref()),
            password_hash: state.hasher.hash(&password)?,
            role,
            image: optional(req.image.as_deref()),
            status: EmployeeStatus::Available,
        })
        .await?;
    info!(user_id = user.id, role = %user.role, "Added employee");

    Ok((
        StatusCode::CREATED,
        Json(AddStaffResponse {
            msg: "Staff added successfully".to_string(),
            staff: EmployeeSummary::from(&user),
        }),
    ))
}

pub async fn signup(
    State(state): State<ApiState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let name = required(req.full_name.as_deref(), "full_name")?;
    let email = required(req.email.as_deref(), "email")?;
    let password = required(req.password.as_deref(), "password")?;
    let confirm = required(req.confirm_password.as_deref(), "confirm_password")?;
    if password != confirm {
        return Err(AppError::bad_request("Passwords do not match"));
    }

    let user = state
        .users
        .insert_user(NewUser {
            name,
            email,
            phone: None,
            address: None,
            username: None,
            password_hash: state.hasher.hash(&password)?,
            role: Role::Customer,
            image: None,
            status: EmployeeStatus::Available,
        })
        .await?;
    info!(user_id = user.id, "Customer signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            msg: "Signup successful".to_string(),
            user: UserProfile::from(&user),
        }),
    ))
}

async fn list_role(state: &ApiState, role: Role) -> Result<Json<Vec<EmployeeSummary>>, AppError> {
    let users = state.users.list_by_role(role).await?;
    Ok(Json(users.iter().map(EmployeeSummary::from).collect()))
}

pub async fn list_agents(
    State(state): State<ApiState>,
) -> Result<Json<Vec<EmployeeSummary>>, AppError> {
    list_role(&state, Role::Agent).await
}

pub async fn list_staff(
    State(state): State<ApiState>,
) -> Result<Json<Vec<EmployeeSummary>>, AppError> {
    list_role(&state, Role::Staff).await
}

pub async fn set_agent_status(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<EmployeeSummary>, AppError> {
    let status: EmployeeStatus = parse_label(req.status.as_deref(), "status")?;

    match state.users.get_user(id).await? {
        Some(user) if user.role == Role::Agent => {}
        _ => return Err(AppError::NotFound(format!("agent {id}"))),
    }

    let user = state.users.set_status(id, status).await?;
    info!(agent_id = id, %status, "Agent status changed");

    Ok(Json(EmployeeSummary::from(&user)))
}
