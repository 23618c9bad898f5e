use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::docstore::RepoError;
use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{}", stock_message(.product, .available))]
    InsufficientStock {
        product: String,
        available: i64,
        cart_item_id: Option<Uuid>,
    },

    #[error("Cart is empty")]
    EmptyOrder,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("{0}")]
    DocError(#[from] RepoError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

fn stock_message(product: &str, available: &i64) -> String {
    if *available > 0 {
        format!("Only {available} left in stock for {product}")
    } else {
        format!("{product} is out of stock")
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        AppError::Validation(fields)
    }
}

fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid"));
                    out.push(FieldError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&path, nested, out),
            ValidationErrorsKind::List(map) => {
                for (index, nested) in map {
                    collect_field_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cart_item_id: Option<Uuid>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::EmptyOrder => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::DbError(err) => {
                tracing::error!(error = %err, "relational store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::OrmError(err) => {
                tracing::error!(error = %err, "relational store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::DocError(err) => match err {
                RepoError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
                RepoError::Duplicate(_) => (StatusCode::CONFLICT, self.to_string()),
                RepoError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
                RepoError::Database(detail) => {
                    tracing::error!(error = %detail, "document store failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error".to_string(),
                    )
                }
            },
            AppError::Internal(err) => {
                tracing::error!(error = %err, "unhandled failure");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let (fields, available_stock, cart_item_id) = match &self {
            AppError::Validation(fields) => (Some(fields.clone()), None, None),
            AppError::InsufficientStock {
                available,
                cart_item_id,
                ..
            } => (None, Some(*available), *cart_item_id),
            _ => (None, None, None),
        };

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData {
                error: message,
                fields,
                available_stock,
                cart_item_id,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
