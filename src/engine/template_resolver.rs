// ==========================================
// 服装生产进度引擎 - 进度模板解析
// ==========================================
// 职责: 款号 → 有序环节 + 权重
// 规则:
// - 保留环节 OrderCreated / Procurement 固定置于最前（模板未声明时使用配置权重）
// - 模板内同义环节只保留第一个
// - 生产环节权重按比例缩放到 (100 - 保留权重)；全为 0 时均分
// - 开启 insert_cutting_stage 且模板有生产环节但无裁剪环节 → 采购之后补入 Cutting，
//   其原始权重取已声明生产环节的平均值
// - 保留权重之和 > 100 时不再缩放，由计算器按总权重归一
// 缓存: 按款号缓存已解析模板，可按款号/全部失效
// ==========================================

use crate::config::ProgressConfig;
use crate::domain::stage_template::{
    StageDefinition, StageTemplate, TemplateDocument, STAGE_CUTTING, STAGE_ORDER_CREATED, STAGE_PROCUREMENT,
};
use crate::engine::stage_names::StageNameMatcher;
use crate::repository::error::RepositoryResult;
use crate::repository::progress_store_trait::TemplateStore;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 兜底模板缓存 key
const DEFAULT_CACHE_KEY: &str = "";

pub struct StageTemplateResolver {
    store: Arc<dyn TemplateStore>,
    matcher: Arc<dyn StageNameMatcher>,
    config: ProgressConfig,
    cache: Mutex<HashMap<String, Arc<StageTemplate>>>,
}

impl StageTemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>, matcher: Arc<dyn StageNameMatcher>, config: ProgressConfig) -> Self {
        Self {
            store,
            matcher,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 解析款式模板
    ///
    /// # 说明
    /// - 模板缺失或 JSON 损坏 → 只含保留环节的模板（计算时走兜底）
    /// - 存储不可用 → 返回错误
    pub fn resolve(&self, style_no: Option<&str>) -> RepositoryResult<Arc<StageTemplate>> {
        let style = style_no.map(str::trim).filter(|s| !s.is_empty());
        let cache_key = style.unwrap_or(DEFAULT_CACHE_KEY).to_string();

        if self.config.template_cache_enabled {
            if let Some(hit) = self.cached(&cache_key) {
                return Ok(hit);
            }
        }

        let document = match self.store.load_template_json(style)? {
            Some(raw) => match TemplateDocument::from_json(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("进度模板 JSON 解析失败，按空模板处理: style_no={:?}, error={}", style, e);
                    TemplateDocument::default()
                }
            },
            None => {
                tracing::debug!("未找到进度模板: style_no={:?}", style);
                TemplateDocument::default()
            }
        };

        let template = Arc::new(build_template(
            style.map(str::to_string),
            &document,
            &self.config,
            self.matcher.as_ref(),
        ));

        if self.config.template_cache_enabled {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(cache_key, Arc::clone(&template));
            }
        }
        Ok(template)
    }

    /// 保存模板并使受影响的缓存失效
    ///
    /// # 参数
    /// - style_no: 款号；None 表示默认模板（所有款号都可能回退到它，清空全部缓存）
    pub fn save(&self, style_no: Option<&str>, template_json: &str, at: NaiveDateTime) -> RepositoryResult<String> {
        let template_id = self.store.save_template_json(style_no, template_json, at)?;
        match style_no.map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => self.invalidate(Some(style)),
            None => self.invalidate_all(),
        }
        Ok(template_id)
    }

    /// 使单个款号的缓存失效
    pub fn invalidate(&self, style_no: Option<&str>) {
        let key = style_no.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_CACHE_KEY);
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(key);
        }
    }

    /// 清空缓存（默认模板变更时使用）
    pub fn invalidate_all(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, key: &str) -> Option<Arc<StageTemplate>> {
        self.cache.lock().ok().and_then(|c| c.get(key).cloned())
    }
}

/// 由模板文档构建标准化模板
pub fn build_template(
    style_no: Option<String>,
    document: &TemplateDocument,
    config: &ProgressConfig,
    matcher: &dyn StageNameMatcher,
) -> StageTemplate {
    let mut order_created_weight: Option<f64> = None;
    let mut procurement_weight: Option<f64> = None;
    let mut production: Vec<(String, Option<f64>)> = Vec::new();

    for node in &document.nodes {
        let name = node.name.trim();
        if name.is_empty() {
            continue;
        }
        if matcher.is_order_created_stage(name) {
            order_created_weight = order_created_weight.or(Some(node.weight.unwrap_or(config.order_created_weight)));
            continue;
        }
        if matcher.is_procurement_stage(name) {
            procurement_weight = procurement_weight.or(Some(node.weight.unwrap_or(config.procurement_weight)));
            continue;
        }
        if production.iter().any(|(existing, _)| matcher.stages_equal(existing, name)) {
            tracing::debug!("模板内重复环节已忽略: stage={}", name);
            continue;
        }
        production.push((name.to_string(), node.weight));
    }

    let reserved = [
        StageDefinition::new(STAGE_ORDER_CREATED, order_created_weight.unwrap_or(config.order_created_weight)),
        StageDefinition::new(STAGE_PROCUREMENT, procurement_weight.unwrap_or(config.procurement_weight)),
    ];
    let reserved_sum: f64 = reserved.iter().map(|s| s.weight).sum();
    let remaining = (100.0 - reserved_sum).max(0.0);

    let mut raw_weights: Vec<f64> = production
        .iter()
        .map(|(_, w)| w.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0))
        .collect();

    let missing_cutting = !production.iter().any(|(name, _)| matcher.is_cutting_stage(name));
    if config.insert_cutting_stage && !production.is_empty() && missing_cutting {
        let mean = raw_weights.iter().sum::<f64>() / raw_weights.len() as f64;
        production.insert(0, (STAGE_CUTTING.to_string(), None));
        raw_weights.insert(0, mean);
        tracing::debug!("模板未声明裁剪环节，已补入: style_no={:?}", style_no);
    }
    let raw_sum: f64 = raw_weights.iter().sum();

    let mut stages: Vec<StageDefinition> = reserved.to_vec();
    for ((name, _), raw) in production.iter().zip(raw_weights.iter()) {
        let weight = if raw_sum > 0.0 {
            raw * remaining / raw_sum
        } else {
            remaining / production.len() as f64
        };
        stages.push(StageDefinition::new(name.clone(), weight));
    }

    StageTemplate::new(style_no, stages)
}

/// 兜底模板: 保留环节 + 观察到的非保留环节均分剩余权重
pub fn fallback_template<'a>(
    style_no: Option<String>,
    config: &ProgressConfig,
    observed: impl Iterator<Item = &'a str>,
) -> StageTemplate {
    let extra: Vec<&str> = observed.collect();
    let remaining = (100.0 - config.reserved_weight()).max(0.0);

    let mut stages = vec![
        StageDefinition::new(STAGE_ORDER_CREATED, config.order_created_weight),
        StageDefinition::new(STAGE_PROCUREMENT, config.procurement_weight),
    ];
    for name in &extra {
        stages.push(StageDefinition::new(*name, remaining / extra.len() as f64));
    }

    let mut template = StageTemplate::new(style_no, stages);
    template.synthetic = true;
    template
}

/// 模板中非保留环节数量
pub fn production_stage_count(template: &StageTemplate, matcher: &dyn StageNameMatcher) -> usize {
    template
        .stages
        .iter()
        .filter(|s| !matcher.is_base_stage(&s.name))
        .count()
}
