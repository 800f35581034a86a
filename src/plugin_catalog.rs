//! Synthetic catalog plugins.
//!
//! These generate plausible listings from fixed templates without touching
//! the network. Output is a pure function of the query text: the generator
//! is seeded from a SHA-256 of the query, so repeated scrapes of the same
//! query yield the same links and exercise the deduplication path.

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use scrapqt_core::models::RawItem;

use crate::plugins::SourcePlugin;

struct Template {
    brand: &'static str,
    model: &'static str,
    specs: &'static str,
}

const fn t(brand: &'static str, model: &'static str, specs: &'static str) -> Template {
    Template {
        brand,
        model,
        specs,
    }
}

const CATEGORIES: [&str; 5] = ["laptop", "smartphone", "mouse", "keyboard", "headset"];

/// Seed derived from the query and a per-plugin salt.
fn seed_for(salt: &str, query: &str) -> u64 {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update([0u8])
        .chain_update(query.as_bytes())
        .finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ═══════════════════════════════════════════════════════════════════════
// ExampleCommerce
// ═══════════════════════════════════════════════════════════════════════

static EXAMPLE_TEMPLATES: [(&str, [Template; 4]); 5] = [
    (
        "laptop",
        [
            t("TechPro", "UltraBook X15", "16GB RAM, 512GB SSD, RTX 4060"),
            t("PowerMax", "Gaming Beast G7", "32GB RAM, 1TB SSD, RTX 4070"),
            t("SlimTech", "Business Elite", "8GB RAM, 256GB SSD, Intel Iris"),
            t("ProGamer", "Destroyer XV", "16GB RAM, 1TB HDD+256GB SSD, RTX 4080"),
        ],
    ),
    (
        "smartphone",
        [
            t("PhoneTech", "Galaxy Pro Max", "128GB, 6.7\" Display, 108MP Camera"),
            t("MobilePro", "Ultra X12", "256GB, 6.1\" Display, 64MP Triple Camera"),
            t("SmartDevices", "Pixel Ultimate", "512GB, 6.4\" OLED, 50MP AI Camera"),
            t("TechMobile", "PowerPhone 15", "128GB, 6.0\" Display, 48MP Camera"),
        ],
    ),
    (
        "mouse",
        [
            t("GamerPro", "Precision X1", "Wireless, RGB, 25600 DPI, Ergonomic"),
            t("TechGrip", "Elite Gaming", "Wired, Programmable, 16000 DPI, Lightweight"),
            t("OfficeMax", "Business Silent", "Wireless, Silent Click, 1600 DPI"),
            t("ProGaming", "Tournament Pro", "Wired, Mechanical Switches, 32000 DPI"),
        ],
    ),
    (
        "keyboard",
        [
            t("KeyMaster", "Mechanical Pro", "RGB Backlit, Blue Switches, Full Size"),
            t("TypeMax", "Silent Worker", "Wireless, Brown Switches, Compact"),
            t("GamerKeys", "RGB Elite", "Mechanical, Red Switches, TKL, RGB"),
            t("OfficeType", "Business Pro", "Membrane, Quiet, Ergonomic Design"),
        ],
    ),
    (
        "headset",
        [
            t("AudioMax", "Gaming Pro X", "7.1 Surround, Noise Canceling, RGB"),
            t("SoundTech", "Studio Elite", "Hi-Fi, 50mm Drivers, Professional"),
            t("GameAudio", "Tournament", "Wireless, Low Latency, 20hr Battery"),
            t("ProSound", "Office Comfort", "Lightweight, Clear Mic, All-day Comfort"),
        ],
    ),
];

const USED_CONDITIONS: [&str; 5] = [
    "Like New",
    "Excellent Condition",
    "Minor Wear",
    "Good Condition",
    "Refurbished",
];

const EXAMPLE_COLORS: [&str; 6] = ["4CAF50", "FF5722", "2196F3", "FF9800", "9C27B0", "607D8B"];

fn example_price_range(category: &str) -> (f64, f64) {
    match category {
        "laptop" => (800.0, 3000.0),
        "smartphone" => (200.0, 1500.0),
        "mouse" => (20.0, 150.0),
        "keyboard" => (30.0, 200.0),
        "headset" => (25.0, 300.0),
        _ => (50.0, 500.0),
    }
}

/// Mid-range electronics storefront with 3 to 6 listings per query.
pub struct ExampleCommerce;

impl ExampleCommerce {
    pub fn new() -> Self {
        Self
    }

    fn category(query: &str, rng: &mut StdRng) -> &'static str {
        let q = query.to_lowercase();
        if let Some(c) = CATEGORIES.iter().copied().find(|c| q.contains(c)) {
            return c;
        }
        if q.contains("gaming") {
            return ["laptop", "mouse", "keyboard", "headset"][rng.random_range(0..4)];
        }
        if q.contains("phone") || q.contains("mobile") {
            return "smartphone";
        }
        if q.contains("computer") || q.contains("pc") {
            return "laptop";
        }
        CATEGORIES[rng.random_range(0..CATEGORIES.len())]
    }

    fn generate(&self, query: &str) -> Vec<RawItem> {
        let seed = seed_for("examplecommerce", query);
        let mut rng = StdRng::seed_from_u64(seed);
        let category = Self::category(query, &mut rng);
        let templates = EXAMPLE_TEMPLATES
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, ts)| ts)
            .unwrap_or(&EXAMPLE_TEMPLATES[0].1);

        let count = rng.random_range(3..=6);
        let tag = seed % 10_000;
        let (min_price, max_price) = example_price_range(category);

        (0..count)
            .map(|i| {
                let template = &templates[rng.random_range(0..templates.len())];
                // The first listing is always new.
                let is_used = i > 0 && rng.random_bool(0.5);

                let title = if is_used {
                    let condition = USED_CONDITIONS.choose(&mut rng).copied().unwrap_or("Used");
                    format!("{} {} ({})", template.brand, template.model, condition)
                } else {
                    format!("{} {}", template.brand, template.model)
                };

                let mut price = rng.random_range(min_price..max_price);
                if is_used {
                    price *= 1.0 - rng.random_range(0.15..0.45);
                }
                let price = if price < 100.0 {
                    round_to(price, 0.5)
                } else {
                    round_to(price, 5.0)
                };

                let rating = one_decimal(rng.random_range(3.8..4.9));
                let rating_count = rng.random_range(15..=500);

                let mut description =
                    format!("{} {} - {}. ", template.brand, template.model, template.specs);
                if is_used {
                    description.push_str("Pre-owned item in excellent working condition. ");
                }
                description.push_str(&format!(
                    "Perfect for {}. Rated {:.1}/5 by {} customers.",
                    query, rating, rating_count
                ));

                let color = EXAMPLE_COLORS[i % EXAMPLE_COLORS.len()];
                let image_url = format!(
                    "https://via.placeholder.com/400x400/{}/white?text={}+{}",
                    color,
                    template.brand.replace(' ', "+"),
                    template.model.replace(' ', "+")
                );

                RawItem {
                    title,
                    link: format!(
                        "https://examplecommerce.com/{}/{}-{}-{}",
                        category,
                        category,
                        i + 1,
                        tag
                    ),
                    price: Some(price),
                    rating: Some(rating),
                    rating_count: Some(rating_count),
                    is_used: Some(is_used),
                    description: Some(description),
                    image_url: Some(image_url),
                }
            })
            .collect()
    }
}

impl Default for ExampleCommerce {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for ExampleCommerce {
    fn platform_name(&self) -> &str {
        "ExampleCommerce"
    }

    fn description(&self) -> &str {
        "Synthetic mid-range electronics catalog (3-6 listings per query)"
    }

    async fn scrape(&self, query: &str) -> Result<Vec<RawItem>> {
        Ok(self.generate(query))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PremiumElectronics
// ═══════════════════════════════════════════════════════════════════════

struct PremiumTemplate {
    template: Template,
    price_range: (f64, f64),
}

const fn pt(
    brand: &'static str,
    model: &'static str,
    specs: &'static str,
    min: f64,
    max: f64,
) -> PremiumTemplate {
    PremiumTemplate {
        template: t(brand, model, specs),
        price_range: (min, max),
    }
}

static PREMIUM_LAPTOPS: [PremiumTemplate; 3] = [
    pt("AppleTech", "MacBook Pro Max", "64GB RAM, 2TB SSD, M2 Ultra", 2500.0, 6000.0),
    pt("DellXPS", "Creator Edition", "32GB RAM, 1TB SSD, RTX 4090", 3000.0, 5000.0),
    pt("ThinkPad", "X1 Carbon Ultimate", "32GB RAM, 1TB SSD, Intel i7", 2000.0, 3500.0),
];
static PREMIUM_PHONES: [PremiumTemplate; 3] = [
    pt("iPhone", "Pro Max 256GB", "256GB, 6.7\" ProMotion, Triple Camera", 1100.0, 1600.0),
    pt("Samsung", "Galaxy Ultra S24", "512GB, 6.8\" Dynamic AMOLED, S Pen", 1200.0, 1800.0),
    pt("Google", "Pixel Pro 8", "256GB, 6.7\" LTPO OLED, AI Camera", 900.0, 1400.0),
];
static PREMIUM_MICE: [PremiumTemplate; 2] = [
    pt("Logitech", "MX Master 3S", "Wireless, Precision Scroll, 4000 DPI", 80.0, 120.0),
    pt("Razer", "Basilisk V3 Pro", "Wireless, RGB, 30000 DPI, Pro Switches", 120.0, 160.0),
];
static PREMIUM_KEYBOARDS: [PremiumTemplate; 2] = [
    pt("Keychron", "K2 Wireless", "Hot-swap, Aluminum, Brown Switches", 80.0, 150.0),
    pt("Corsair", "K100 RGB", "Optical Switches, RGB, Premium Build", 200.0, 250.0),
];
static PREMIUM_HEADSETS: [PremiumTemplate; 2] = [
    pt("Sony", "WH-1000XM5", "ANC, Hi-Res Audio, 30hr Battery", 300.0, 400.0),
    pt("Bose", "QuietComfort Ultra", "Premium ANC, Spatial Audio, Comfort", 350.0, 450.0),
];

const PREMIUM_COLORS: [&str; 5] = ["1A237E", "4A148C", "BF360C", "1B5E20", "E65100"];

fn premium_templates(category: &str) -> &'static [PremiumTemplate] {
    match category {
        "smartphone" => &PREMIUM_PHONES,
        "mouse" => &PREMIUM_MICE,
        "keyboard" => &PREMIUM_KEYBOARDS,
        "headset" => &PREMIUM_HEADSETS,
        _ => &PREMIUM_LAPTOPS,
    }
}

/// High-end storefront with 2 to 4 listings per query, 30% certified
/// refurbished.
pub struct PremiumElectronics;

impl PremiumElectronics {
    pub fn new() -> Self {
        Self
    }

    fn category(query: &str, rng: &mut StdRng) -> &'static str {
        let q = query.to_lowercase();
        if let Some(c) = CATEGORIES.iter().copied().find(|c| q.contains(c)) {
            return c;
        }
        if ["gaming", "computer", "pc"].iter().any(|w| q.contains(w)) {
            return "laptop";
        }
        if ["phone", "mobile", "iphone", "samsung"]
            .iter()
            .any(|w| q.contains(w))
        {
            return "smartphone";
        }
        CATEGORIES[rng.random_range(0..CATEGORIES.len())]
    }

    fn generate(&self, query: &str) -> Vec<RawItem> {
        let seed = seed_for("premiumelectronics", query);
        let mut rng = StdRng::seed_from_u64(seed);
        let category = Self::category(query, &mut rng);
        let templates = premium_templates(category);
        let count = rng.random_range(2..=4);

        (0..count)
            .map(|i| {
                let PremiumTemplate {
                    template,
                    price_range: (min, max),
                } = &templates[rng.random_range(0..templates.len())];
                let is_used = rng.random_bool(0.3);

                let mut price = rng.random_range(*min..*max);
                if is_used {
                    price *= rng.random_range(0.7..0.85);
                }
                let price = round_to(price, 10.0);
                let rating = one_decimal(rng.random_range(4.2..4.9));
                let rating_count = rng.random_range(50..=800);

                let condition = if is_used {
                    "Certified Refurbished"
                } else {
                    "Brand New"
                };
                let mut description = format!(
                    "Premium {} {} featuring {}. ",
                    template.brand, template.model, template.specs
                );
                if is_used {
                    description.push_str("Certified refurbished with full warranty. ");
                }
                description.push_str(&format!(
                    "Exceptional build quality and performance. Highly rated by {} verified customers.",
                    rating_count
                ));

                let item_tag = seed.wrapping_add(i as u64 * 2000) % 10_000;
                RawItem {
                    title: format!("{} {} - {}", template.brand, template.model, condition),
                    link: format!(
                        "https://premiumelectronics.com/products/premium-{}-{}",
                        category, item_tag
                    ),
                    price: Some(price),
                    rating: Some(rating),
                    rating_count: Some(rating_count),
                    is_used: Some(is_used),
                    description: Some(description),
                    image_url: Some(format!(
                        "https://via.placeholder.com/500x400/{}/white?text={}+Premium",
                        PREMIUM_COLORS[i % PREMIUM_COLORS.len()],
                        template.brand.replace(' ', "")
                    )),
                }
            })
            .collect()
    }
}

impl Default for PremiumElectronics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourcePlugin for PremiumElectronics {
    fn platform_name(&self) -> &str {
        "PremiumElectronics"
    }

    fn description(&self) -> &str {
        "Synthetic high-end electronics catalog (2-4 listings per query)"
    }

    async fn scrape(&self, query: &str) -> Result<Vec<RawItem>> {
        Ok(self.generate(query))
    }
}
