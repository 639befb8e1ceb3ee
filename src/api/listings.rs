use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::accounts::{EmployeeSummary, StatusRequest};
use super::{optional, parse_label, required, ApiState};
use crate::assignment::AssignmentBranch;
use crate::error::AppError;
use crate::models::{
    AreaUnit, ListingId, LotType, NewProperty, Property, PropertyStatus, UserId,
};
use crate::stores::PropertyFilter;

/// Fewest images a new listing may carry
pub const MIN_IMAGES: usize = 4;
/// Most images a new listing may carry
pub const MAX_IMAGES: usize = 10;

struct UploadedImage {
    file_name: String,
    bytes: Bytes,
}

/// Raw multipart listing form
#[derive(Default)]
struct ListingForm {
    fields: HashMap<String, String>,
    images: Vec<UploadedImage>,
}

impl ListingForm {
    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Listing metadata that passed validation, waiting for an agent and image paths
#[derive(Debug)]
struct ListingDraft {
    lot_name: String,
    lot_number: Option<String>,
    lot_type: LotType,
    price: f64,
    province: String,
    lot_area: f64,
    area_unit: AreaUnit,
    location: String,
    description: String,
    created_by: Option<UserId>,
}

fn positive_number(value: Option<&str>, field: &str) -> Result<f64, AppError> {
    let raw = required(value, field)?;
    match raw.replace(',', "").parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(AppError::bad_request(format!("Valid {field} is required"))),
    }
}

impl ListingDraft {
    fn validate(form: &ListingForm) -> Result<Self, AppError> {
        let lot_name = required(form.get("lot_name"), "lot_name")?;
        let lot_type = parse_label(form.get("lot_type"), "lot_type")?;
        let price = positive_number(form.get("price"), "price")?;
        let province = required(form.get("province"), "province")?;
        let lot_area = positive_number(form.get("lot_area"), "lot_area")?;
        let area_unit = match optional(form.get("area_unit")) {
            Some(unit) => parse_label(Some(unit.as_str()), "area_unit")?,
            None => AreaUnit::default(),
        };
        let created_by = match optional(form.get("created_by")) {
            Some(id) => Some(
                id.parse::<UserId>()
                    .map_err(|_| AppError::bad_request("created_by must be a user id"))?,
            ),
            None => None,
        };

        let count = form.images.len();
        if !(MIN_IMAGES..=MAX_IMAGES).contains(&count) {
            return Err(AppError::bad_request(format!(
                "Please upload between {MIN_IMAGES} and {MAX_IMAGES} images (got {count})"
            )));
        }

        Ok(Self {
            lot_name,
            lot_number: optional(form.get("lot_number")),
            lot_type,
            price,
            province,
            lot_area,
            area_unit,
            location: optional(form.get("location")).unwrap_or_default(),
            description: optional(form.get("description")).unwrap_or_default(),
            created_by,
        })
    }

    fn into_new_property(
        self,
        assigned_agent_id: UserId,
        image_paths: Vec<String>,
    ) -> NewProperty {
        NewProperty {
            lot_name: self.lot_name,
            lot_number: self.lot_number,
            lot_type: self.lot_type,
            price: self.price,
            province: self.province,
            lot_area: self.lot_area,
            area_unit: self.area_unit,
            location: self.location,
            description: self.description,
            assigned_agent_id,
            created_by: self.created_by,
            image_paths,
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<ListingForm, AppError> {
    let mut form = ListingForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "images" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let bytes = field.bytes().await?;
            if bytes.is_empty() {
                debug!(%file_name, "Skipping empty image part");
                continue;
            }
            if form.images.len() == MAX_IMAGES {
                return Err(AppError::bad_request(format!(
                    "At most {MAX_IMAGES} images may be uploaded"
                )));
            }
            form.images.push(UploadedImage { file_name, bytes });
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Best-effort cleanup of images written for a listing that was not stored
async fn discard_images(state: &ApiState, paths: &[String]) {
    for path in paths {
        if let Err(e) = state.images.remove_image(path).await {
            warn!(%path, error = %e, "Could not remove orphaned image");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePropertyResponse {
    pub msg: String,
    pub listing_id: ListingId,
    pub assigned_agent_id: UserId,
    pub assignment: AssignmentBranch,
    pub property: Property,
}

pub async fn create_property(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatePropertyResponse>), AppError> {
    let form = read_form(multipart).await?;
    let draft = ListingDraft::validate(&form)?;
    debug!(lot_name = %draft.lot_name, images = form.images.len(), "Listing form validated");

    let assignment = state.selector.assign().await?;

    let mut paths = Vec::with_capacity(form.images.len());
    for image in &form.images {
        match state.images.save_image(&image.file_name, &image.bytes).await {
            Ok(path) => paths.push(path),
            Err(e) => {
                discard_images(&state, &paths).await;
                return Err(e.into());
            }
        }
    }

    let new_property = draft.into_new_property(assignment.agent_id, paths.clone());
    let property = match state.properties.insert_property(new_property).await {
        Ok(p) => p,
        Err(e) => {
            discard_images(&state, &paths).await;
            return Err(e.into());
        }
    };

    info!(
        listing_id = property.listing_id,
        agent_id = assignment.agent_id,
        branch = %assignment.branch,
        "Property listing created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePropertyResponse {
            msg: "Property added successfully".to_string(),
            listing_id: property.listing_id,
            assigned_agent_id: assignment.agent_id,
            assignment: assignment.branch,
            property,
        }),
    ))
}

/// Approved listings shown to customers
pub async fn list_public(
    State(state): State<ApiState>,
    Query(mut filter): Query<PropertyFilter>,
) -> Result<Json<Vec<Property>>, AppError> {
    filter.status = Some(PropertyStatus::Available);
    Ok(Json(state.properties.list_properties(&filter).await?))
}

/// Every listing, for admin oversight
pub async fn list_admin(
    State(state): State<ApiState>,
    Query(filter): Query<PropertyFilter>,
) -> Result<Json<Vec<Property>>, AppError> {
    Ok(Json(state.properties.list_properties(&filter).await?))
}

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub agent: Option<EmployeeSummary>,
}

pub async fn get_property(
    State(state): State<ApiState>,
    Path(id): Path<ListingId>,
) -> Result<Json<PropertyDetail>, AppError> {
    let property = state
        .properties
        .get_property(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("property {id}")))?;

    let agent = state
        .users
        .get_user(property.assigned_agent_id)
        .await?
        .map(|u| EmployeeSummary::from(&u));

    Ok(Json(PropertyDetail { property, agent }))
}

#[derive(Debug, Serialize)]
pub struct PropertyStatusResponse {
    pub msg: String,
    pub property: Property,
}

pub async fn set_property_status(
    State(state): State<ApiState>,
    Path(id): Path<ListingId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<PropertyStatusResponse>, AppError> {
    let status: PropertyStatus = parse_label(req.status.as_deref(), "status")?;
    let property = state.properties.set_property_status(id, status).await?;
    info!(listing_id = id, %status, "Property status changed");

    Ok(Json(PropertyStatusResponse {
        msg: format!("Property marked {status}"),
        property,
    }))
}
