use serde::{Deserialize, Serialize};

use crate::models::taxonomy::{FormulaType, Taxonomy};

/// 四大类公式的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    #[serde(default)]
    pub closed_form: u64,
    #[serde(default)]
    pub recurrence: u64,
    #[serde(default)]
    pub generating_function: u64,
    #[serde(default)]
    pub other: u64,
}

impl TypeCounts {
    pub fn get(&self, formula_type: FormulaType) -> u64 {
        match formula_type {
            FormulaType::ClosedForm => self.closed_form,
            FormulaType::Recurrence => self.recurrence,
            FormulaType::GeneratingFunction => self.generating_function,
            FormulaType::Other => self.other,
        }
    }

    pub fn increment(&mut self, formula_type: FormulaType) {
        match formula_type {
            FormulaType::ClosedForm => self.closed_form += 1,
            FormulaType::Recurrence => self.recurrence += 1,
            FormulaType::GeneratingFunction => self.generating_function += 1,
            FormulaType::Other => self.other += 1,
        }
    }

    pub fn merge(&mut self, other: &TypeCounts) {
        self.closed_form += other.closed_form;
        self.recurrence += other.recurrence;
        self.generating_function += other.generating_function;
        self.other += other.other;
    }

    /// 按总公式数计算各类占比；总数为 0 时全部为 0，不做除法
    pub fn percentages(&self, total_formulas: u64) -> TypePercentages {
        if total_formulas == 0 {
            return TypePercentages::default();
        }
        let pct = |count: u64| round2(count as f64 / total_formulas as f64 * 100.0);
        TypePercentages {
            closed_form: pct(self.closed_form),
            recurrence: pct(self.recurrence),
            generating_function: pct(self.generating_function),
            other: pct(self.other),
        }
    }
}

/// 四大类公式的百分比（保留两位小数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TypePercentages {
    #[serde(default)]
    pub closed_form: f64,
    #[serde(default)]
    pub recurrence: f64,
    #[serde(default)]
    pub generating_function: f64,
    #[serde(default)]
    pub other: f64,
}

impl TypePercentages {
    pub fn get(&self, formula_type: FormulaType) -> f64 {
        match formula_type {
            FormulaType::ClosedForm => self.closed_form,
            FormulaType::Recurrence => self.recurrence,
            FormulaType::GeneratingFunction => self.generating_function,
            FormulaType::Other => self.other,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 单个任务（分片）的统计信息
///
/// 写入每个任务目录下的 formula_type_statistics.json，可由结果文件重新推导。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardStatistics {
    pub total_sequences: u64,
    pub successful_sequences: u64,
    pub failed_sequences: u64,
    pub total_formulas: u64,
    pub type_counts: TypeCounts,
    #[serde(default)]
    pub type_categories: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub type_percentages: TypePercentages,
}

impl ShardStatistics {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        Self {
            type_categories: taxonomy.descriptions(),
            ..Default::default()
        }
    }

    /// 记录一个成功解析的序列及其公式类型
    pub fn record_sequence(&mut self, formula_types: impl IntoIterator<Item = FormulaType>) {
        self.successful_sequences += 1;
        self.total_sequences += 1;
        for formula_type in formula_types {
            self.type_counts.increment(formula_type);
            self.total_formulas += 1;
        }
    }

    /// 记录一个解析失败的序列
    pub fn record_failure(&mut self) {
        self.failed_sequences += 1;
        self.total_sequences += 1;
    }

    /// 重算百分比字段（写盘前调用）
    pub fn finalize(&mut self) {
        self.type_percentages = self.type_counts.percentages(self.total_formulas);
    }
}

/// 所有任务的全局汇总报告
///
/// 写入结果根目录下的 summary_report.json。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryReport {
    pub total_tasks: u64,
    pub total_sequences: u64,
    pub failed_sequences: u64,
    pub total_formulas: u64,
    pub formula_type_counts: TypeCounts,
    #[serde(default)]
    pub formula_categories: serde_json::Map<String, serde_json::Value>,
    pub formula_type_percentages: TypePercentages,
}

impl SummaryReport {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        Self {
            formula_categories: taxonomy.descriptions(),
            ..Default::default()
        }
    }

    /// 并入一个任务的统计信息
    ///
    /// total_sequences 与单任务口径一致，包含解析失败的序列。
    pub fn absorb(&mut self, stats: &ShardStatistics) {
        self.total_tasks += 1;
        self.total_sequences += stats.total_sequences;
        self.failed_sequences += stats.failed_sequences;
        self.total_formulas += stats.total_formulas;
        self.formula_type_counts.merge(&stats.type_counts);
    }

    /// 重算百分比字段（写盘前调用）
    pub fn finalize(&mut self) {
        self.formula_type_percentages = self.formula_type_counts.percentages(self.total_formulas);
    }
}
