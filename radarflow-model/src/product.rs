//! Product descriptors for the two radar product families: Level-2 base
//! moments and Level-3 derived products identified by AWIPS id.

use std::fmt::Display;

/// The family a radar product belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadarProductGroup {
    /// Base data: full-resolution moments straight from the radar.
    Level2,
    /// Derived products generated by the radar product generator.
    Level3,
}

impl RadarProductGroup {
    /// Short display name for the product group.
    pub fn name(&self) -> &'static str {
        match self {
            RadarProductGroup::Level2 => "L2",
            RadarProductGroup::Level3 => "L3",
        }
    }
}

impl Display for RadarProductGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The moment data block types a radial may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MomentType {
    /// Base reflectivity (dBZ).
    Reflectivity,
    /// Radial velocity (m/s).
    Velocity,
    /// Spectrum width (m/s).
    SpectrumWidth,
    /// Differential reflectivity (dB).
    DifferentialReflectivity,
    /// Differential phase (degrees).
    DifferentialPhase,
    /// Correlation coefficient.
    CorrelationCoefficient,
    /// Clutter filter power removed (dB).
    ClutterFilterPower,
}

/// All moment types, in indexing order.
pub const MOMENT_TYPES: [MomentType; 7] = [
    MomentType::Reflectivity,
    MomentType::Velocity,
    MomentType::SpectrumWidth,
    MomentType::DifferentialReflectivity,
    MomentType::DifferentialPhase,
    MomentType::CorrelationCoefficient,
    MomentType::ClutterFilterPower,
];

/// A Level-2 base data product. Each product maps to a specific moment data
/// block type in the radial data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level2Product {
    Reflectivity,
    Velocity,
    SpectrumWidth,
    DifferentialReflectivity,
    DifferentialPhase,
    CorrelationCoefficient,
    ClutterFilterPowerRemoved,
}

impl Level2Product {
    /// The moment data block type carrying this product's data.
    pub fn moment_type(&self) -> MomentType {
        match self {
            Level2Product::Reflectivity => MomentType::Reflectivity,
            Level2Product::Velocity => MomentType::Velocity,
            Level2Product::SpectrumWidth => MomentType::SpectrumWidth,
            Level2Product::DifferentialReflectivity => MomentType::DifferentialReflectivity,
            Level2Product::DifferentialPhase => MomentType::DifferentialPhase,
            Level2Product::CorrelationCoefficient => MomentType::CorrelationCoefficient,
            Level2Product::ClutterFilterPowerRemoved => MomentType::ClutterFilterPower,
        }
    }

    /// Resolves a product from its conventional short name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "REF" => Some(Level2Product::Reflectivity),
            "VEL" => Some(Level2Product::Velocity),
            "SW" => Some(Level2Product::SpectrumWidth),
            "ZDR" => Some(Level2Product::DifferentialReflectivity),
            "PHI" => Some(Level2Product::DifferentialPhase),
            "RHO" => Some(Level2Product::CorrelationCoefficient),
            "CFP" => Some(Level2Product::ClutterFilterPowerRemoved),
            _ => None,
        }
    }

    /// Conventional short name for the product.
    pub fn name(&self) -> &'static str {
        match self {
            Level2Product::Reflectivity => "REF",
            Level2Product::Velocity => "VEL",
            Level2Product::SpectrumWidth => "SW",
            Level2Product::DifferentialReflectivity => "ZDR",
            Level2Product::DifferentialPhase => "PHI",
            Level2Product::CorrelationCoefficient => "RHO",
            Level2Product::ClutterFilterPowerRemoved => "CFP",
        }
    }
}

impl Display for Level2Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Categories of Level-3 derived products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level3Category {
    Reflectivity,
    Velocity,
    StormRelativeVelocity,
    SpectrumWidth,
    DifferentialReflectivity,
    SpecificDifferentialPhase,
    CorrelationCoefficient,
    VerticallyIntegratedLiquid,
    EchoTops,
    Precipitation,
}

/// Descriptor for one Level-3 product: the three-character AWIPS id, the
/// numeric product code, and the product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level3ProductInfo {
    /// The three-character AWIPS product identifier (e.g. "N0B").
    pub awips_id: &'static str,
    /// The numeric product code.
    pub code: u16,
    /// The product category.
    pub category: Level3Category,
}

/// The known Level-3 products, keyed by AWIPS id.
const LEVEL3_PRODUCTS: [Level3ProductInfo; 14] = [
    Level3ProductInfo {
        awips_id: "N0B",
        code: 153,
        category: Level3Category::Reflectivity,
    },
    Level3ProductInfo {
        awips_id: "N0Q",
        code: 94,
        category: Level3Category::Reflectivity,
    },
    Level3ProductInfo {
        awips_id: "N0G",
        code: 154,
        category: Level3Category::Velocity,
    },
    Level3ProductInfo {
        awips_id: "N0U",
        code: 99,
        category: Level3Category::Velocity,
    },
    Level3ProductInfo {
        awips_id: "N0S",
        code: 56,
        category: Level3Category::StormRelativeVelocity,
    },
    Level3ProductInfo {
        awips_id: "NSW",
        code: 30,
        category: Level3Category::SpectrumWidth,
    },
    Level3ProductInfo {
        awips_id: "N0X",
        code: 159,
        category: Level3Category::DifferentialReflectivity,
    },
    Level3ProductInfo {
        awips_id: "N0K",
        code: 163,
        category: Level3Category::SpecificDifferentialPhase,
    },
    Level3ProductInfo {
        awips_id: "N0C",
        code: 161,
        category: Level3Category::CorrelationCoefficient,
    },
    Level3ProductInfo {
        awips_id: "DVL",
        code: 134,
        category: Level3Category::VerticallyIntegratedLiquid,
    },
    Level3ProductInfo {
        awips_id: "EET",
        code: 135,
        category: Level3Category::EchoTops,
    },
    Level3ProductInfo {
        awips_id: "N1P",
        code: 78,
        category: Level3Category::Precipitation,
    },
    Level3ProductInfo {
        awips_id: "NTP",
        code: 80,
        category: Level3Category::Precipitation,
    },
    Level3ProductInfo {
        awips_id: "DAA",
        code: 170,
        category: Level3Category::Precipitation,
    },
];

/// Looks up a Level-3 product descriptor by AWIPS id.
pub fn level3_product(awips_id: &str) -> Option<&'static Level3ProductInfo> {
    LEVEL3_PRODUCTS
        .iter()
        .find(|product| product.awips_id == awips_id)
}

/// The known AWIPS ids belonging to the given category.
pub fn level3_products_by_category(category: Level3Category) -> Vec<&'static str> {
    LEVEL3_PRODUCTS
        .iter()
        .filter(|product| product.category == category)
        .map(|product| product.awips_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level2_products_map_to_moments() {
        assert_eq!(
            Level2Product::Reflectivity.moment_type(),
            MomentType::Reflectivity
        );
        assert_eq!(
            Level2Product::ClutterFilterPowerRemoved.moment_type(),
            MomentType::ClutterFilterPower
        );
    }

    #[test]
    fn level2_names_round_trip() {
        for product in [
            Level2Product::Reflectivity,
            Level2Product::Velocity,
            Level2Product::SpectrumWidth,
            Level2Product::DifferentialReflectivity,
            Level2Product::DifferentialPhase,
            Level2Product::CorrelationCoefficient,
            Level2Product::ClutterFilterPowerRemoved,
        ] {
            assert_eq!(Level2Product::from_name(product.name()), Some(product));
        }
        assert_eq!(Level2Product::from_name("XYZ"), None);
    }

    #[test]
    fn level3_awips_lookup() {
        let product = level3_product("N0B").unwrap();
        assert_eq!(product.code, 153);
        assert_eq!(product.category, Level3Category::Reflectivity);

        assert!(level3_product("ZZZ").is_none());
    }

    #[test]
    fn level3_category_listing() {
        let reflectivity = level3_products_by_category(Level3Category::Reflectivity);
        assert!(reflectivity.contains(&"N0B"));
        assert!(reflectivity.contains(&"N0Q"));
    }
}
