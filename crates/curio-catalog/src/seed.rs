//! Demo catalog seed data.

use crate::model::{Product, ProductCategory};
use std::collections::BTreeMap;

fn specs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn strings(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_string()).collect()
}

/// Sample products seeded by the demo server and used as test fixtures.
pub fn demo_catalog() -> Vec<Product> {
    vec![
        Product {
            id: "prod_001".to_string(),
            name: "Wireless Bluetooth Headphones".to_string(),
            description: "Premium noise-cancelling wireless headphones with 30-hour battery life"
                .to_string(),
            price: 199.99,
            category: ProductCategory::Electronics,
            image_url: "https://images.example.com/products/headphones.jpg".to_string(),
            in_stock: true,
            stock_quantity: 15,
            rating: 4.5,
            reviews_count: 1247,
            specifications: specs(&[
                ("brand", "TechSound"),
                ("model", "TS-1000"),
                ("warranty", "2 years"),
            ]),
            features: strings(&[
                "Active Noise Cancellation",
                "Quick Charge",
                "Voice Assistant Compatible",
            ]),
        },
        Product {
            id: "prod_002".to_string(),
            name: "Smartphone Protective Case".to_string(),
            description: "Ultra-slim transparent case with wireless charging support".to_string(),
            price: 29.99,
            category: ProductCategory::Electronics,
            image_url: "https://images.example.com/products/phone-case.jpg".to_string(),
            in_stock: true,
            stock_quantity: 150,
            rating: 4.2,
            reviews_count: 892,
            specifications: specs(&[("material", "TPU + PC"), ("compatibility", "iPhone 14/15")]),
            features: strings(&[
                "Wireless Charging Compatible",
                "Drop Protection",
                "Crystal Clear",
            ]),
        },
        Product {
            id: "prod_003".to_string(),
            name: "100% Organic Cotton T-Shirt".to_string(),
            description: "Comfortable premium cotton t-shirt in multiple colors".to_string(),
            price: 24.99,
            category: ProductCategory::Clothing,
            image_url: "https://images.example.com/products/t-shirt.jpg".to_string(),
            in_stock: true,
            stock_quantity: 200,
            rating: 4.0,
            reviews_count: 3456,
            specifications: specs(&[
                ("material", "100% Organic Cotton"),
                ("care", "Machine Washable"),
            ]),
            features: strings(&["100% Organic Cotton", "Pre-shrunk", "Available in 12 Colors"]),
        },
        Product {
            id: "prod_004".to_string(),
            name: "Smart Home Security Camera".to_string(),
            description: "AI-powered security camera with motion detection".to_string(),
            price: 149.99,
            category: ProductCategory::Electronics,
            image_url: "https://images.example.com/products/camera.jpg".to_string(),
            in_stock: true,
            stock_quantity: 45,
            rating: 4.7,
            reviews_count: 567,
            specifications: specs(&[
                ("resolution", "4K Ultra HD"),
                ("night_vision", "Up to 30ft"),
            ]),
            features: strings(&[
                "4K Ultra HD Recording",
                "AI Motion Detection",
                "Two-Way Audio",
            ]),
        },
        Product {
            id: "prod_005".to_string(),
            name: "Ceramic Pour-Over Coffee Set".to_string(),
            description: "Hand-glazed ceramic dripper and carafe for slow brewing".to_string(),
            price: 54.99,
            category: ProductCategory::Home,
            image_url: "https://images.example.com/products/coffee-set.jpg".to_string(),
            in_stock: true,
            stock_quantity: 60,
            rating: 4.6,
            reviews_count: 214,
            specifications: specs(&[("capacity", "600ml"), ("material", "Glazed Ceramic")]),
            features: strings(&["Dishwasher Safe", "Includes Reusable Filter"]),
        },
        Product {
            id: "prod_006".to_string(),
            name: "The Systems Design Handbook".to_string(),
            description: "Practical guide to designing reliable distributed systems".to_string(),
            price: 39.99,
            category: ProductCategory::Books,
            image_url: "https://images.example.com/products/handbook.jpg".to_string(),
            in_stock: true,
            stock_quantity: 80,
            rating: 4.8,
            reviews_count: 1023,
            specifications: specs(&[("pages", "412"), ("format", "Hardcover")]),
            features: strings(&["Worked Examples", "Case Studies"]),
        },
        Product {
            id: "prod_007".to_string(),
            name: "Trail Running Shoes".to_string(),
            description: "Lightweight trail shoes with aggressive grip".to_string(),
            price: 119.99,
            category: ProductCategory::Sports,
            image_url: "https://images.example.com/products/trail-shoes.jpg".to_string(),
            in_stock: true,
            stock_quantity: 90,
            rating: 4.4,
            reviews_count: 765,
            specifications: specs(&[("drop", "6mm"), ("weight", "280g")]),
            features: strings(&["Vibram Outsole", "Quick-Dry Mesh"]),
        },
        Product {
            id: "prod_008".to_string(),
            name: "Vitamin C Facial Serum".to_string(),
            description: "Brightening serum with hyaluronic acid".to_string(),
            price: 34.99,
            category: ProductCategory::Beauty,
            image_url: "https://images.example.com/products/serum.jpg".to_string(),
            in_stock: true,
            stock_quantity: 120,
            rating: 4.3,
            reviews_count: 1890,
            specifications: specs(&[("volume", "30ml"), ("ph", "5.5")]),
            features: strings(&["Fragrance Free", "Vegan"]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::demo_catalog;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn demo_catalog_ids_are_unique_and_purchasable() {
        let products = demo_catalog();
        let ids: HashSet<&str> = products.iter().map(|product| product.id.as_str()).collect();
        assert_eq!(ids.len(), products.len());
        assert!(
            products
                .iter()
                .all(|product| product.in_stock && product.stock_quantity > 0)
        );
    }
}
