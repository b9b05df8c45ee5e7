//! Catalog and contact endpoints, public and admin.

use reqwest::multipart::Form;
use serde_json::Value;

use super::client::{decode, ApiClient};
use super::error::ApiError;
use super::types::{Category, ContactMessage, Envelope, Product, ProductQuery};

pub async fn products(client: &ApiClient, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
    let envelope: Envelope<Vec<Product>> = decode("/products", client.get("/products", query).await?)?;
    Ok(envelope.data)
}

pub async fn product(client: &ApiClient, id: u64) -> Result<Product, ApiError> {
    let path = format!("/products/{}", id);
    let envelope: Envelope<Product> = decode(&path, client.get(&path, &()).await?)?;
    Ok(envelope.data)
}

pub async fn categories(client: &ApiClient) -> Result<Vec<Category>, ApiError> {
    let envelope: Envelope<Vec<Category>> = decode("/categories", client.get("/categories", &()).await?)?;
    Ok(envelope.data)
}

pub async fn category_products(client: &ApiClient, id: u64) -> Result<Vec<Product>, ApiError> {
    let path = format!("/categories/{}/products", id);
    let envelope: Envelope<Vec<Product>> = decode(&path, client.get(&path, &()).await?)?;
    Ok(envelope.data)
}

/// Submit the storefront contact form. Returns the backend's confirmation.
pub async fn submit_contact(client: &ApiClient, message: &ContactMessage) -> Result<Value, ApiError> {
    client.post("/contact", message).await
}

// ── Admin ───────────────────────────────────────────────────────────────

pub async fn admin_categories(client: &ApiClient) -> Result<Vec<Category>, ApiError> {
    let path = "/admin/categories";
    let envelope: Envelope<Vec<Category>> = decode(path, client.get(path, &()).await?)?;
    Ok(envelope.data)
}

/// Create a product from a multipart form (fields plus image files).
pub async fn create_product(client: &ApiClient, form: Form) -> Result<Product, ApiError> {
    let path = "/admin/products";
    let envelope: Envelope<Product> = decode(path, client.post_multipart(path, form).await?)?;
    Ok(envelope.data)
}

pub async fn update_product(client: &ApiClient, id: u64, changes: &Value) -> Result<Product, ApiError> {
    let path = format!("/admin/products/{}", id);
    let envelope: Envelope<Product> = decode(&path, client.put(&path, changes).await?)?;
    Ok(envelope.data)
}

pub async fn delete_product(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    client.delete(&format!("/admin/products/{}", id)).await?;
    Ok(())
}
