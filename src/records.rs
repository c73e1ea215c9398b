use serde::{Deserialize, Serialize};

/// A parent record a stage runner can iterate: where to fetch and what to
/// call it in progress output.
pub trait Parent {
    fn url(&self) -> Option<&str>;
    fn label(&self) -> String;
}

/// Copies the parent's identity fields onto a freshly extracted child.
/// Stamping happens exactly once, in the stage runner, at append time;
/// extractors never see ancestor data.
pub trait Stamp<P> {
    fn stamp(&mut self, parent: &P);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub brand_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub brand_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub stock_status: String,
    pub stock_quantity: u32,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub brand_name: String,
}

impl Parent for Brand {
    fn url(&self) -> Option<&str> {
        Some(&self.url)
    }
    fn label(&self) -> String {
        self.name.clone()
    }
}

impl Parent for Model {
    fn url(&self) -> Option<&str> {
        Some(&self.url)
    }
    fn label(&self) -> String {
        format!("{} ({})", self.name, self.brand_name)
    }
}

impl Parent for Category {
    fn url(&self) -> Option<&str> {
        Some(&self.url)
    }
    fn label(&self) -> String {
        format!("{} (Model: {})", self.name, self.model_name)
    }
}

impl Stamp<Brand> for Model {
    fn stamp(&mut self, brand: &Brand) {
        self.brand_id = brand.id.clone();
        self.brand_name = brand.name.clone();
    }
}

impl Stamp<Model> for Category {
    fn stamp(&mut self, model: &Model) {
        self.model_id = model.id.clone();
        self.model_name = model.name.clone();
        self.brand_id = model.brand_id.clone();
        self.brand_name = model.brand_name.clone();
    }
}

impl Stamp<Category> for Product {
    fn stamp(&mut self, category: &Category) {
        self.category_id = category.id.clone();
        self.category_name = category.name.clone();
        self.model_id = category.model_id.clone();
        self.model_name = category.model_name.clone();
        self.brand_id = category.brand_id.clone();
        self.brand_name = category.brand_name.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_stamp_carries_full_ancestor_chain() {
        let model = Model {
            id: "42".into(),
            name: "TRX 450".into(),
            url: "https://example.com/m".into(),
            image_url: None,
            brand_id: "7".into(),
            brand_name: "Honda".into(),
        };
        let mut cat = Category {
            id: "9".into(),
            name: "Brakes".into(),
            url: "https://example.com/c".into(),
            image_url: None,
            model_id: String::new(),
            model_name: String::new(),
            brand_id: String::new(),
            brand_name: String::new(),
        };
        cat.stamp(&model);
        assert_eq!(cat.model_id, "42");
        assert_eq!(cat.model_name, "TRX 450");
        assert_eq!(cat.brand_id, "7");
        assert_eq!(cat.brand_name, "Honda");
    }

    #[test]
    fn product_serializes_null_price_not_zero() {
        let product = Product {
            id: "1".into(),
            sku: "SKU1".into(),
            name: "Widget".into(),
            url: None,
            image_url: None,
            price: None,
            stock_status: "Out of Stock".into(),
            stock_quantity: 0,
            category_id: String::new(),
            category_name: String::new(),
            model_id: String::new(),
            model_name: String::new(),
            brand_id: String::new(),
            brand_name: String::new(),
        };
        let json = serde_json::to_value(&product).unwrap();
        assert!(json["price"].is_null());
        assert_eq!(json["stock_quantity"], 0);
    }
}
