use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 公式类型枚举（四大类分类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaType {
    /// 通项公式
    ClosedForm,
    /// 递推公式
    Recurrence,
    /// 生成函数
    GeneratingFunction,
    /// 其他类型
    Other,
}

impl FormulaType {
    /// 全部类型，按固定顺序排列（统计输出依赖此顺序）
    pub const ALL: [FormulaType; 4] = [
        FormulaType::ClosedForm,
        FormulaType::Recurrence,
        FormulaType::GeneratingFunction,
        FormulaType::Other,
    ];

    /// 获取类型标识（JSON 中使用的键）
    pub fn key(self) -> &'static str {
        match self {
            FormulaType::ClosedForm => "closed_form",
            FormulaType::Recurrence => "recurrence",
            FormulaType::GeneratingFunction => "generating_function",
            FormulaType::Other => "other",
        }
    }

    /// 获取中文名称
    pub fn name(self) -> &'static str {
        match self {
            FormulaType::ClosedForm => "通项公式",
            FormulaType::Recurrence => "递推公式",
            FormulaType::GeneratingFunction => "生成函数",
            FormulaType::Other => "其他类型",
        }
    }

    /// 获取带英文注释的描述（用于 prompt 和统计输出）
    pub fn description(self) -> &'static str {
        match self {
            FormulaType::ClosedForm => "通项公式 (closed form)",
            FormulaType::Recurrence => "递推公式 (recurrence relation)",
            FormulaType::GeneratingFunction => "生成函数 (generating function)",
            FormulaType::Other => "其他类型 (other)",
        }
    }

    /// 从字符串精确解析类型
    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "closed_form" => Some(FormulaType::ClosedForm),
            "recurrence" => Some(FormulaType::Recurrence),
            "generating_function" => Some(FormulaType::GeneratingFunction),
            "other" => Some(FormulaType::Other),
            _ => None,
        }
    }

    /// 从字符串解析类型，未知标签统一归入 Other
    pub fn from_key_lenient(s: &str) -> Self {
        Self::from_key(s).unwrap_or(FormulaType::Other)
    }
}

impl std::fmt::Display for FormulaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl Serialize for FormulaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.key())
    }
}

// 模型返回的类型标签不受约束，反序列化时把未知标签归入 other
impl<'de> Deserialize<'de> for FormulaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FormulaType::from_key_lenient(&s))
    }
}

/// 分类体系
///
/// 一套固定的公式类别集合，携带每个类别的描述和示例。
/// 提交和下载流程都以它为参数，避免在多处硬编码类别表。
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

/// 分类体系中的单个类别
#[derive(Debug, Clone)]
pub struct Category {
    pub formula_type: FormulaType,
    /// 分类指南中的说明文字
    pub guideline: &'static str,
    /// 该类别的一个示例
    pub example: &'static str,
}

impl Taxonomy {
    /// 四大类公式分类体系
    pub fn four_way() -> Self {
        Self {
            categories: vec![
                Category {
                    formula_type: FormulaType::ClosedForm,
                    guideline: "直接给出第n项的表达式",
                    example: "F(n) = φ^n/√5 - (1-φ)^n/√5",
                },
                Category {
                    formula_type: FormulaType::Recurrence,
                    guideline: "描述项与项之间关系的公式",
                    example: "F(n) = F(n-1) + F(n-2)",
                },
                Category {
                    formula_type: FormulaType::GeneratingFunction,
                    guideline: "以幂级数形式表示序列的函数",
                    example: "G.f.: x/(1-x-x^2)",
                },
                Category {
                    formula_type: FormulaType::Other,
                    guideline: "不属于以上三类的任何公式，如矩阵形式、恒等式、连分数等",
                    example: "a(n) = A000045(n) * A000032(n)",
                },
            ],
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// 类别键到描述的映射（统计文件中的 type_categories 字段）
    pub fn descriptions(&self) -> serde_json::Map<String, serde_json::Value> {
        self.categories
            .iter()
            .map(|c| {
                (
                    c.formula_type.key().to_string(),
                    serde_json::Value::String(c.formula_type.name().to_string()),
                )
            })
            .collect()
    }
}
