//! Core result types shared across the pipeline.
//!
//! The category set is a closed, ordered enumeration fixed at process start;
//! the wire labels must match the strings the model was trained against
//! byte-for-byte.

use serde::{Deserialize, Serialize};

/// The seven fixed product categories, in training order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Nappies, strollers, feeding bottles and other infant goods.
    #[serde(rename = "Baby Care")]
    BabyCare,
    /// Skincare, cosmetics and grooming products.
    #[serde(rename = "Beauty and Personal Care")]
    BeautyAndPersonalCare,
    /// Computer hardware and accessories.
    #[serde(rename = "Computers")]
    Computers,
    /// Ornaments and festive decoration.
    #[serde(rename = "Home Decor & Festive Needs")]
    HomeDecorAndFestiveNeeds,
    /// Furniture and soft furnishing.
    #[serde(rename = "Home Furnishing")]
    HomeFurnishing,
    /// Cookware, tableware and kitchen appliances.
    #[serde(rename = "Kitchen & Dining")]
    KitchenAndDining,
    /// Wrist watches and timepieces.
    #[serde(rename = "Watches")]
    Watches,
}

impl Category {
    /// All categories in training order.
    pub const ALL: [Self; 7] = [
        Self::BabyCare,
        Self::BeautyAndPersonalCare,
        Self::Computers,
        Self::HomeDecorAndFestiveNeeds,
        Self::HomeFurnishing,
        Self::KitchenAndDining,
        Self::Watches,
    ];

    /// The wire label for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use product_lens::Category;
    ///
    /// assert_eq!(Category::KitchenAndDining.label(), "Kitchen & Dining");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BabyCare => "Baby Care",
            Self::BeautyAndPersonalCare => "Beauty and Personal Care",
            Self::Computers => "Computers",
            Self::HomeDecorAndFestiveNeeds => "Home Decor & Festive Needs",
            Self::HomeFurnishing => "Home Furnishing",
            Self::KitchenAndDining => "Kitchen & Dining",
            Self::Watches => "Watches",
        }
    }

    /// Resolve a wire label to its category.
    ///
    /// Returns [`None`] for any string outside the fixed label set; callers
    /// treat that as a protocol violation, never as a default.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Position of this category in the training order.
    #[must_use]
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Softmax score for a single category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// The category being scored.
    pub category: Category,
    /// Softmax probability in `[0, 1]`.
    pub score: f32,
}

/// Outcome of one classification call.
///
/// `category_scores` holds the full softmax distribution in training order;
/// `predicted_category` is its argmax and `confidence` the corresponding
/// probability. Created per inference call and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// The argmax category.
    pub predicted_category: Category,
    /// Probability of the argmax category, in `[0, 1]`.
    pub confidence: f32,
    /// Softmax distribution over all seven categories.
    pub category_scores: Vec<CategoryScore>,
    /// The keywords supplied to the model, in extraction order.
    pub keywords: Vec<String>,
}

impl PredictionResult {
    /// Look up the score of one category.
    #[must_use]
    pub fn score(&self, category: Category) -> Option<f32> {
        self.category_scores
            .iter()
            .find(|cs| cs.category == category)
            .map(|cs| cs.score)
    }
}

/// Per-pixel attention heatmap aligned to the original image.
///
/// Row-major grid whose shape equals the original (pre-resize) image
/// dimensions, with every cell min-max normalised into `[0, 1]`.
///
/// # Examples
///
/// ```
/// use product_lens::AttentionMap;
///
/// let map = AttentionMap::zeros(600, 800);
/// assert_eq!(map.shape(), (600, 800));
/// assert_eq!(map.get(599, 799), Some(0.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionMap {
    height: usize,
    width: usize,
    values: Vec<f32>,
}

impl AttentionMap {
    /// Build a map from row-major values.
    ///
    /// Returns [`None`] when `values.len() != height * width`.
    #[must_use]
    pub fn from_values(height: usize, width: usize, values: Vec<f32>) -> Option<Self> {
        (values.len() == height.checked_mul(width)?).then_some(Self {
            height,
            width,
            values,
        })
    }

    /// An all-zero map, the defined neutral value for degenerate attention.
    #[must_use]
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            values: vec![0.0; height * width],
        }
    }

    /// `(height, width)` of the map.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Value at `(row, col)`, or [`None`] out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.height && col < self.width)
            .then(|| self.values[row * self.width + col])
    }

    /// Row-major cell values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Normalised attribution score per keyword, in extraction order.
///
/// Scores sum to 1 whenever at least one keyword accumulated attention and
/// to 0 otherwise. Every keyword supplied to the model is present, at 0 when
/// no token mapped to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeywordAttribution {
    entries: Vec<(String, f32)>,
}

impl KeywordAttribution {
    /// Build an attribution from `(keyword, score)` pairs.
    #[must_use]
    pub fn new(entries: Vec<(String, f32)>) -> Self {
        Self { entries }
    }

    /// An all-zero attribution over the supplied keywords.
    #[must_use]
    pub fn zeros<S: AsRef<str>>(keywords: &[S]) -> Self {
        Self {
            entries: keywords
                .iter()
                .map(|k| (k.as_ref().to_owned(), 0.0))
                .collect(),
        }
    }

    /// Score for one keyword, or [`None`] when it was never supplied.
    #[must_use]
    pub fn score(&self, keyword: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, s)| *s)
    }

    /// Iterate `(keyword, score)` pairs in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), *s))
    }

    /// Sum of all scores.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "summing attribution mass")]
    pub fn total(&self) -> f32 {
        self.entries.iter().map(|(_, s)| *s).sum()
    }

    /// Number of keywords covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keywords are covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two explanation artefacts produced for one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Smoothed per-pixel heatmap at the original image dimensions.
    pub attention_map: AttentionMap,
    /// Normalised per-keyword attribution scores.
    pub keyword_attribution: KeywordAttribution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Category::BabyCare, "Baby Care")]
    #[case(Category::HomeDecorAndFestiveNeeds, "Home Decor & Festive Needs")]
    #[case(Category::Watches, "Watches")]
    fn labels_round_trip(#[case] category: Category, #[case] label: &str) {
        assert_eq!(category.label(), label);
        assert_eq!(Category::from_label(label), Some(category));
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert_eq!(Category::from_label("Garden"), None);
        assert_eq!(Category::from_label("baby care"), None);
    }

    #[test]
    fn category_order_is_stable() {
        for (i, category) in Category::ALL.into_iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn serde_uses_wire_labels() {
        let json = serde_json::to_string(&Category::KitchenAndDining)
            .expect("serialise category");
        assert_eq!(json, r#""Kitchen & Dining""#);
        let back: Category =
            serde_json::from_str(r#""Beauty and Personal Care""#).expect("deserialise");
        assert_eq!(back, Category::BeautyAndPersonalCare);
    }

    #[test]
    fn attention_map_rejects_shape_mismatch() {
        assert!(AttentionMap::from_values(2, 2, vec![0.0; 3]).is_none());
        assert!(AttentionMap::from_values(2, 2, vec![0.0; 4]).is_some());
    }

    #[test]
    fn attribution_defaults_to_zero_scores() {
        let attribution = KeywordAttribution::zeros(&["watch", "leather"]);
        assert_eq!(attribution.score("watch"), Some(0.0));
        assert_eq!(attribution.score("missing"), None);
        assert!(attribution.total().abs() < f32::EPSILON);
    }
}
