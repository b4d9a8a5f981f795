//! Back-office product management.
//!
//! Add and edit take `multipart/form-data` so an image can travel with the
//! product fields.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::Redirect,
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{debug, instrument};

use bazaar_core::{Price, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, flash_redirect, take_flashes};
use crate::models::product::DEFAULT_CATEGORY;
use crate::models::{Flash, FlashLevel, NewProduct, Product, ProductUpdate};
use crate::services::uploads::allowed_file;
use crate::services::{CatalogError, CatalogService, MAX_NAME_LENGTH, remove_image, save_image};
use crate::state::AppState;

/// Product list page data.
#[derive(Debug, Serialize)]
pub struct ProductsPage {
    pub products: Vec<Product>,
    pub flashes: Vec<Flash>,
}

/// Single product form page data. `product` is absent on the add page.
#[derive(Debug, Serialize)]
pub struct ProductFormPage {
    pub product: Option<Product>,
    pub flashes: Vec<Flash>,
}

/// An uploaded file part.
struct ImageUpload {
    filename: String,
    bytes: Vec<u8>,
}

/// Raw multipart product form.
#[derive(Default)]
struct ProductForm {
    name: String,
    price: String,
    stock: String,
    category: String,
    feature_html: String,
    old_image: Option<String>,
    image: Option<ImageUpload>,
}

/// Product fields after validation, image not yet resolved.
#[derive(Debug)]
struct ValidProduct {
    name: String,
    price: Price,
    stock: u32,
    category: String,
    feature_html: String,
}

impl ProductForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty part when no file is chosen.
                if !filename.is_empty() && !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            match name.as_str() {
                "name" => form.name = value,
                "price" => form.price = value,
                "stock" => form.stock = value,
                "category" => form.category = value,
                "feature_html" => form.feature_html = value,
                "old_image" => form.old_image = Some(value),
                other => debug!(field = other, "Ignoring unknown product form field"),
            }
        }

        Ok(form)
    }

    /// Validate everything that can be checked without touching storage.
    fn validate(&self) -> std::result::Result<ValidProduct, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Product name is required.".to_owned());
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(format!("Product name must be at most {MAX_NAME_LENGTH} characters."));
        }
        let price = self
            .price
            .parse::<Price>()
            .map_err(|e| format!("Invalid price: {e}"))?;
        let stock = self
            .stock
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid stock: '{}'", self.stock))?;
        if self
            .image
            .as_ref()
            .is_some_and(|image| !allowed_file(&image.filename))
        {
            return Err("Image must be a png, jpg, jpeg or gif file.".to_owned());
        }

        let category = self.category.trim();
        Ok(ValidProduct {
            name: name.to_owned(),
            price,
            stock,
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_owned()
            } else {
                category.to_owned()
            },
            feature_html: self.feature_html.clone(),
        })
    }
}

/// Store the uploaded image, if any. Returns its public path.
async fn store_image(state: &AppState, image: Option<&ImageUpload>) -> Result<Option<String>> {
    match image {
        Some(image) => Ok(Some(
            save_image(&state.config().upload_dir(), &image.filename, &image.bytes).await?,
        )),
        None => Ok(None),
    }
}

/// Remove an image stored for a write that did not go through.
async fn discard_image(state: &AppState, stored: Option<&str>) {
    if let Some(path) = stored {
        remove_image(&state.config().upload_dir(), path).await;
    }
}

/// Product list.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ProductsPage>> {
    let catalog = CatalogService::new(state.pool(), state.config().page_size);
    Ok(Json(ProductsPage {
        products: catalog.all_products().await?,
        flashes: take_flashes(&session).await?,
    }))
}

/// Add product page.
#[instrument(skip_all)]
pub async fn new_page(
    RequireAdmin(_admin): RequireAdmin,
    session: Session,
) -> Result<Json<ProductFormPage>> {
    Ok(Json(ProductFormPage {
        product: None,
        flashes: take_flashes(&session).await?,
    }))
}

/// Create a product from a multipart form.
#[instrument(skip_all)]
pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Redirect> {
    const BACK: &str = "/admin/products/add";

    let form = ProductForm::from_multipart(multipart).await?;
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            return Ok(flash_redirect(&session, FlashLevel::Danger, message, BACK).await?);
        }
    };

    let catalog = CatalogService::new(state.pool(), state.config().page_size);
    let stored = store_image(&state, form.image.as_ref()).await?;
    let result = catalog
        .create(NewProduct {
            name: valid.name,
            price: valid.price,
            image: stored.clone().unwrap_or_default(),
            stock: valid.stock,
            category: valid.category,
            feature_html: valid.feature_html,
        })
        .await;

    if result.is_err() {
        discard_image(&state, stored.as_deref()).await;
    }
    match result {
        Ok(_) => {
            let redirect = flash_redirect(
                &session,
                FlashLevel::Success,
                "Product added!",
                "/admin/products",
            );
            Ok(redirect.await?)
        }
        Err(CatalogError::InvalidProduct(message)) => {
            Ok(flash_redirect(&session, FlashLevel::Danger, message, BACK).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit product page.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn edit_page(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductFormPage>> {
    let product = CatalogService::new(state.pool(), state.config().page_size)
        .product(id)
        .await?;

    Ok(Json(ProductFormPage {
        product: Some(product),
        flashes: take_flashes(&session).await?,
    }))
}

/// Update a product from a multipart form.
///
/// Without a new file the image is taken from `old_image`, or left as is.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Redirect> {
    let back = format!("/admin/products/edit/{id}");
    let catalog = CatalogService::new(state.pool(), state.config().page_size);
    let current = catalog.product(id).await?;

    let form = ProductForm::from_multipart(multipart).await?;
    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            return Ok(flash_redirect(&session, FlashLevel::Danger, message, &back).await?);
        }
    };

    let stored = store_image(&state, form.image.as_ref()).await?;
    let image = match &stored {
        Some(path) => path.clone(),
        None => form.old_image.unwrap_or(current.image),
    };
    let result = catalog
        .update(
            id,
            ProductUpdate {
                name: valid.name,
                price: valid.price,
                image,
                stock: valid.stock,
                category: valid.category,
                feature_html: valid.feature_html,
            },
        )
        .await;

    if result.is_err() {
        discard_image(&state, stored.as_deref()).await;
    }
    match result {
        Ok(_) => {
            let redirect = flash_redirect(
                &session,
                FlashLevel::Success,
                "Product updated!",
                "/admin/products",
            );
            Ok(redirect.await?)
        }
        Err(CatalogError::InvalidProduct(message)) => {
            Ok(flash_redirect(&session, FlashLevel::Danger, message, &back).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a product.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    CatalogService::new(state.pool(), state.config().page_size)
        .delete(id)
        .await?;

    let redirect = flash_redirect(
        &session,
        FlashLevel::Success,
        "Product deleted!",
        "/admin/products",
    );
    Ok(redirect.await?)
}
