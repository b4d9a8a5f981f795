//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Ceramic Mug
//!   price: "12.50"
//!   stock: 40
//!   category: kitchen
//!   image: /static/uploads/mug.png
//!   feature_html: "<p>Dishwasher safe.</p>"
//! ```
//!
//! `category` defaults to `general`; `image` and `feature_html` default to
//! empty. Products whose name already exists are skipped.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use bazaar_core::Price;
use bazaar_storefront::db::products::ProductRepository;
use bazaar_storefront::models::NewProduct;
use bazaar_storefront::models::product::DEFAULT_CATEGORY;
use bazaar_storefront::services::CatalogService;

use super::connect;

/// One product entry in a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub price: Price,
    pub stock: u32,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub feature_html: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

impl From<SeedProduct> for NewProduct {
    fn from(seed: SeedProduct) -> Self {
        Self {
            name: seed.name,
            price: seed.price,
            image: seed.image,
            stock: seed.stock,
            category: seed.category,
            feature_html: seed.feature_html,
        }
    }
}

/// Parse a seed file's contents.
///
/// # Errors
///
/// Returns `serde_yaml::Error` if the YAML is malformed or a field is invalid.
pub fn parse_products(content: &str) -> Result<Vec<SeedProduct>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Seed products from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML file
/// * `clear_existing` - If true, delete every product first
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or database
/// operations fail.
pub async fn products(
    file_path: &str,
    clear_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Parse before connecting so a bad file changes nothing
    let content = tokio::fs::read_to_string(path).await?;
    let seeds = parse_products(&content)?;
    info!(products = seeds.len(), "Parsed seed file");

    let (config, pool) = connect().await?;
    let repo = ProductRepository::new(&pool);
    let catalog = CatalogService::new(&pool, config.page_size);

    if clear_existing {
        let removed = repo.delete_all().await?;
        warn!(removed, "Cleared existing products");
    }

    let mut inserted = 0_usize;
    let mut skipped = 0_usize;
    let mut failed = 0_usize;
    for seed in seeds {
        if repo.find_by_name(seed.name.trim()).await?.is_some() {
            skipped += 1;
            continue;
        }
        let name = seed.name.clone();
        match catalog.create(seed.into()).await {
            Ok(_) => inserted += 1,
            Err(e) => {
                error!(product = %name, error = %e, "Failed to seed product");
                failed += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Products inserted: {inserted}");
    info!("  Products skipped (already exist): {skipped}");
    if failed > 0 {
        error!("  Errors: {failed}");
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products_applies_defaults() {
        let yaml = r#"
- name: Ceramic Mug
  price: "12.50"
  stock: 40
- name: Tea Towel
  price: 4
  stock: 0
  category: kitchen
  feature_html: "<b>Linen</b>"
"#;
        let products = parse_products(yaml).unwrap();
        assert_eq!(products.len(), 2);

        let mug = products.first().unwrap();
        assert_eq!(mug.category, DEFAULT_CATEGORY);
        assert_eq!(mug.price, "12.50".parse().unwrap());
        assert!(mug.image.is_empty());

        let towel = products.get(1).unwrap();
        assert_eq!(towel.category, "kitchen");
        assert_eq!(towel.stock, 0);
    }

    #[test]
    fn test_parse_products_rejects_negative_values() {
        assert!(parse_products("- {name: X, price: \"-1\", stock: 1}").is_err());
        assert!(parse_products("- {name: X, price: \"1\", stock: -1}").is_err());
    }
}
