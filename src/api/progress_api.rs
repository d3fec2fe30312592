// ==========================================
// 服装生产进度引擎 - 进度 API
// ==========================================
// 职责: 订单进度重算、人工推进/退回、采购确认、到料率更新
// 红线: 所有人工写入必须记录 ActionLog；异步重算失败只留痕不上抛
// 说明: 引擎为纯计算，本层负责加载输入与落库
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use futures::future::join_all;
use rusqlite::Connection;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ProgressConfig};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{ArrivalCompletion, OrderMeta, OrderProgressSnapshot, ProcurementConfirmation};
use crate::domain::scan_event::CompletionEvent;
use crate::domain::stage_template::{StageTemplate, TemplateDocument};
use crate::domain::types::{EventKind, Operator, OverrideKind};
use crate::engine::aggregator::{ScanStageAggregator, StageAggregate, StageAggregator};
use crate::engine::manual_override::ManualOverrideAdjuster;
use crate::engine::recompute::{ProgressRecomputeEngine, RecomputeInput};
use crate::engine::repositories::ProgressRepositories;
use crate::engine::rollback::RollbackInvalidator;
use crate::engine::stage_names::{StageNameMatcher, SynonymStageMatcher};
use crate::engine::template_resolver::StageTemplateResolver;
use crate::perf::OpTimer;
use crate::repository::view_stage_aggregator::ViewStageAggregator;

// ==========================================
// AggregatorKind - 环节聚合实现选择
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregatorKind {
    /// 读取扫码记录后内存去重
    #[default]
    InMemory,
    /// 读取预聚合视图 v_scan_stage_done
    View,
}

// ==========================================
// ProgressApi - 进度 API
// ==========================================

/// 进度API
///
/// 职责：
/// 1. 同步/异步/按款式批量重算订单进度
/// 2. 人工推进、人工退回（作废后续扫码记录）
/// 3. 人工确认采购、更新到料率
/// 4. ActionLog记录
pub struct ProgressApi {
    repos: ProgressRepositories,
    aggregator: Arc<dyn StageAggregator>,
    resolver: StageTemplateResolver,
    engine: ProgressRecomputeEngine,
}

impl ProgressApi {
    /// 创建新的ProgressApi实例
    ///
    /// # 参数
    /// - repos: 仓储集合
    /// - aggregator: 环节聚合实现
    /// - matcher: 环节名匹配器（模板解析与引擎共用）
    /// - config: 进度计算配置
    pub fn new(
        repos: ProgressRepositories,
        aggregator: Arc<dyn StageAggregator>,
        matcher: Arc<dyn StageNameMatcher>,
        config: ProgressConfig,
    ) -> Self {
        let resolver = StageTemplateResolver::new(repos.templates.clone(), matcher.clone(), config.clone());
        let engine = ProgressRecomputeEngine::new(matcher, config);
        Self {
            repos,
            aggregator,
            resolver,
            engine,
        }
    }

    /// 基于 SQLite 连接装配（配置从 config_kv 读取）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, kind: AggregatorKind) -> ApiResult<Self> {
        let config = ConfigManager::new(conn.clone()).load_progress_config()?;
        let matcher: Arc<dyn StageNameMatcher> = Arc::new(SynonymStageMatcher::default());
        let repos = ProgressRepositories::from_connection(conn.clone());
        let aggregator: Arc<dyn StageAggregator> = match kind {
            AggregatorKind::InMemory => Arc::new(ScanStageAggregator::new(repos.events.clone(), matcher.clone())),
            AggregatorKind::View => Arc::new(ViewStageAggregator::new(conn, matcher.clone())),
        };
        Ok(Self::new(repos, aggregator, matcher, config))
    }

    pub fn config(&self) -> &ProgressConfig {
        self.engine.config()
    }

    /// 模板缓存（模板维护后调用 invalidate）
    pub fn template_resolver(&self) -> &StageTemplateResolver {
        &self.resolver
    }

    // ==========================================
    // 重算接口
    // ==========================================

    /// 同步重算订单进度并写入快照
    ///
    /// # 参数
    /// - order_id: 订单ID
    ///
    /// # 返回
    /// - Ok(OrderProgressSnapshot): 最新快照
    /// - Err(ApiError::NotFound): 订单不存在或已删除
    #[instrument(skip(self))]
    pub fn recompute(&self, order_id: &str) -> ApiResult<OrderProgressSnapshot> {
        let order_id = require_order_id(order_id)?;
        let _timer = OpTimer::start("recompute", order_id);

        let snapshot = self.compute_snapshot(order_id)?;
        if self.repos.orders.persist_snapshot(&snapshot, now())? {
            return Ok(snapshot);
        }

        // 计算期间订单被改为终态，按最新状态再算一次
        info!(order_id = %order_id, "订单状态已变更为终态，按最新状态重算");
        let snapshot = self.compute_snapshot(order_id)?;
        self.repos.orders.persist_snapshot(&snapshot, now())?;
        Ok(snapshot)
    }

    fn compute_snapshot(&self, order_id: &str) -> ApiResult<OrderProgressSnapshot> {
        let meta = self.load_meta(order_id)?;
        let template = self.resolver.resolve(meta.style_no.as_deref())?;
        let aggregate = self.aggregator.aggregate(order_id, &template)?;
        let events = self.repos.events.load_events(order_id, &[EventKind::Production])?;

        let outcome = self.engine.compute(&RecomputeInput {
            meta: &meta,
            template: &template,
            aggregate: &aggregate,
            events: &events,
        });
        Ok(outcome.snapshot)
    }

    /// 异步重算（扫码提交后调用，不阻塞扫码链路）
    ///
    /// 失败写入 RecomputeFailure 审计日志，不向调用方传播。
    /// 需在 tokio 运行时内调用。
    pub fn recompute_async(self: &Arc<Self>, order_id: &str) -> JoinHandle<()> {
        let api = Arc::clone(self);
        let order_id = order_id.trim().to_string();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = api.recompute(&order_id) {
                warn!(order_id = %order_id, error = %e, "异步重算失败");
                api.record_failure(&order_id, &e);
            }
        })
    }

    /// 按款式批量重算（并发执行）
    ///
    /// # 返回
    /// - Ok(usize): 重算成功的订单数（单个失败只记录日志）
    #[instrument(skip(self))]
    pub async fn recompute_by_style(self: &Arc<Self>, style_no: &str) -> ApiResult<usize> {
        let style_no = style_no.trim();
        if style_no.is_empty() {
            return Err(ApiError::InvalidInput("款号不能为空".to_string()));
        }
        let order_ids = self.repos.orders.list_order_ids_by_style(style_no)?;
        info!(style_no = %style_no, count = order_ids.len(), "开始按款式重算");

        let tasks = order_ids.into_iter().map(|order_id| {
            let api = Arc::clone(self);
            async move {
                let task_order_id = order_id.clone();
                let result = tokio::task::spawn_blocking(move || api.recompute(&task_order_id))
                    .await
                    .map_err(|e| ApiError::InternalError(format!("任务执行失败: {}", e)))
                    .and_then(|r| r);
                (order_id, result)
            }
        });
        let results = join_all(tasks).await;

        let mut success = 0usize;
        for (order_id, result) in &results {
            match result {
                Ok(_) => success += 1,
                Err(e) => warn!(order_id = %order_id, error = %e, "款式重算单个订单失败"),
            }
        }
        info!(
            style_no = %style_no,
            total = results.len(),
            success,
            failed = results.len() - success,
            "按款式重算完成"
        );
        Ok(success)
    }

    // ==========================================
    // 人工指令
    // ==========================================

    /// 人工推进/退回
    ///
    /// # 参数
    /// - kind: Advance 抬高下限；Rollback 委托 apply_rollback
    /// - target_stage: 目标环节（须在模板中）
    /// - reason: 原因
    /// - operator: 操作人
    #[instrument(skip(self))]
    pub fn apply_manual_override(
        &self,
        order_id: &str,
        kind: OverrideKind,
        target_stage: &str,
        reason: &str,
        operator: &Operator,
    ) -> ApiResult<OrderProgressSnapshot> {
        if kind == OverrideKind::Rollback {
            return self.apply_rollback(order_id, target_stage, reason, operator);
        }

        let order_id = require_order_id(order_id)?;
        let target_stage = require_stage(target_stage)?;
        let meta = self.load_meta(order_id)?;
        let template = self.effective_template(&meta)?;

        let marker_percent = ManualOverrideAdjuster::new(self.engine.matcher())
            .marker_percent(&template, target_stage)
            .ok_or_else(|| ApiError::UnknownStage(target_stage.to_string()))?;

        let at = now();
        let marker = CompletionEvent::override_marker(
            order_id,
            OverrideKind::Advance,
            target_stage,
            reason,
            operator.id.clone(),
            operator.name.clone(),
            at,
        );
        self.repos.events.append_event(&marker)?;

        self.record_audit(
            &ActionLog::new(Some(order_id), ActionType::ManualAdvance, operator.display_name(), at).with_payload(
                json!({
                    "target_stage": target_stage,
                    "reason": reason.trim(),
                    "marker_percent": marker_percent,
                }),
            ),
        );
        info!(order_id = %order_id, target_stage = %target_stage, marker_percent, "人工推进");

        self.recompute(order_id)
    }

    /// 人工退回到指定环节
    ///
    /// 作废目标之后的生产扫码、全部质检/入库扫码、目标之后的推进标记，
    /// 写入退回标记后重算。同一目标重复退回不再作废任何记录。
    #[instrument(skip(self))]
    pub fn apply_rollback(
        &self,
        order_id: &str,
        target_stage: &str,
        reason: &str,
        operator: &Operator,
    ) -> ApiResult<OrderProgressSnapshot> {
        let order_id = require_order_id(order_id)?;
        let target_stage = require_stage(target_stage)?;
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("退回原因不能为空".to_string()));
        }

        let meta = self.load_meta(order_id)?;
        let template = self.effective_template(&meta)?;
        let events = self.repos.events.load_events(order_id, &[])?;
        let plan = RollbackInvalidator::new(self.engine.matcher())
            .plan(&template, &events, target_stage)
            .ok_or_else(|| ApiError::UnknownStage(target_stage.to_string()))?;

        let at = now();
        let marker = CompletionEvent::override_marker(
            order_id,
            OverrideKind::Rollback,
            &plan.target_stage,
            reason,
            operator.id.clone(),
            operator.name.clone(),
            at,
        );
        let invalidated = self
            .repos
            .events
            .append_with_invalidation(&marker, &plan.directives, at)?;

        self.record_audit(
            &ActionLog::new(Some(order_id), ActionType::ManualRollback, operator.display_name(), at).with_payload(
                json!({
                    "target_stage": plan.target_stage,
                    "reason": reason.trim(),
                    "invalidated": invalidated,
                }),
            ),
        );
        info!(
            order_id = %order_id,
            target_stage = %plan.target_stage,
            invalidated,
            "人工退回"
        );

        self.recompute(order_id)
    }

    /// 人工确认采购完成
    ///
    /// # 返回
    /// - Err(ApiError::ProcurementBelowFloor): 到料率低于硬下限
    /// - Err(ApiError::ProcurementAlreadyConfirmed): 已确认过
    /// - Err(ApiError::InvalidInput): 备注过短
    #[instrument(skip(self))]
    pub fn confirm_procurement(
        &self,
        order_id: &str,
        operator: &Operator,
        remark: &str,
    ) -> ApiResult<OrderProgressSnapshot> {
        let order_id = require_order_id(order_id)?;
        let meta = self.load_meta(order_id)?;
        self.engine.gate().check_confirmation(&meta)?;

        let remark = remark.trim();
        let min_chars = self.config().confirm_remark_min_chars;
        if remark.chars().count() < min_chars {
            return Err(ApiError::InvalidInput(format!(
                "确认备注至少{}个字符（当前{}个）",
                min_chars,
                remark.chars().count()
            )));
        }

        let at = now();
        let confirmation = ProcurementConfirmation {
            confirmed_at: at,
            operator_id: operator.id.clone(),
            operator_name: operator.name.clone(),
            remark: remark.to_string(),
        };
        self.repos.orders.confirm_procurement(order_id, &confirmation)?;

        self.record_audit(
            &ActionLog::new(Some(order_id), ActionType::ProcurementConfirm, operator.display_name(), at).with_payload(
                json!({
                    "arrival_rate": meta.arrival_rate(),
                    "remark": remark,
                }),
            ),
        );
        info!(order_id = %order_id, arrival_rate = meta.arrival_rate(), "人工确认采购完成");

        self.recompute(order_id)
    }

    /// 更新物料到货率（钳制到 0-100）
    ///
    /// 首次达到自动完成阈值时记录时间与经办人，之后的更新保留首次记录。
    #[instrument(skip(self))]
    pub fn update_material_arrival_rate(
        &self,
        order_id: &str,
        rate: i32,
        operator: &Operator,
    ) -> ApiResult<OrderProgressSnapshot> {
        let order_id = require_order_id(order_id)?;
        let meta = self.load_meta(order_id)?;
        let rate = rate.clamp(0, 100);

        let at = now();
        let completion = (rate >= self.engine.gate().auto_rate() && meta.arrival_completion.is_none()).then(|| {
            ArrivalCompletion {
                completed_at: at,
                operator_id: operator.id.clone(),
                operator_name: operator.name.clone(),
            }
        });
        self.repos
            .orders
            .update_arrival_rate(order_id, rate, completion.as_ref(), at)?;

        self.record_audit(
            &ActionLog::new(Some(order_id), ActionType::ArrivalRateUpdate, operator.display_name(), at).with_payload(
                json!({
                    "previous_rate": meta.arrival_rate(),
                    "rate": rate,
                }),
            ),
        );

        self.recompute(order_id)
    }

    // ==========================================
    // 模板维护
    // ==========================================

    /// 保存进度模板，并使受影响的模板缓存失效
    ///
    /// # 参数
    /// - style_no: 款号；None 表示默认模板
    /// - template_json: `{"nodes":[{"name":"Cutting","weight":20}, ...]}`
    ///
    /// # 返回
    /// - Ok(String): template_id
    /// - Err(ApiError::InvalidInput): JSON 格式错误
    #[instrument(skip(self, template_json))]
    pub fn save_stage_template(
        &self,
        style_no: Option<&str>,
        template_json: &str,
        operator: &Operator,
    ) -> ApiResult<String> {
        let document = TemplateDocument::from_json(template_json)
            .map_err(|e| ApiError::InvalidInput(format!("进度模板 JSON 格式错误: {}", e)))?;
        let style_no = style_no.map(str::trim).filter(|s| !s.is_empty());

        let at = now();
        let template_id = self.resolver.save(style_no, template_json, at)?;

        self.record_audit(
            &ActionLog::new(None, ActionType::TemplateUpdate, operator.display_name(), at).with_payload(json!({
                "template_id": template_id,
                "style_no": style_no,
                "nodes": document.nodes.len(),
            })),
        );
        info!(style_no = ?style_no, template_id = %template_id, "进度模板已保存");
        Ok(template_id)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_meta(&self, order_id: &str) -> ApiResult<OrderMeta> {
        self.repos
            .orders
            .load_order_meta(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("生产订单(id={})不存在或已删除", order_id)))
    }

    /// 人工指令按实际参与计算的模板解析目标环节
    fn effective_template(&self, meta: &OrderMeta) -> ApiResult<StageTemplate> {
        let template = self.resolver.resolve(meta.style_no.as_deref())?;
        let aggregate: StageAggregate = self.aggregator.aggregate(&meta.order_id, &template)?;
        Ok(self.engine.effective_template(&template, &aggregate).into_owned())
    }

    /// 审计写入失败只告警，不影响已生效的操作
    fn record_audit(&self, log: &ActionLog) {
        if let Err(e) = self.repos.audit.record(log) {
            warn!(order_id = ?log.order_id, action_type = %log.action_type, error = %e, "记录操作日志失败");
        }
    }

    fn record_failure(&self, order_id: &str, err: &ApiError) {
        let log = ActionLog::new(Some(order_id), ActionType::RecomputeFailure, "system", now())
            .with_detail(err.to_string());
        if let Err(e) = self.repos.audit.record(&log) {
            warn!(order_id = %order_id, error = %e, "重算失败审计写入失败");
        }
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn require_order_id(order_id: &str) -> ApiResult<&str> {
    let order_id = order_id.trim();
    if order_id.is_empty() {
        return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
    }
    Ok(order_id)
}

fn require_stage(target_stage: &str) -> ApiResult<&str> {
    let target_stage = target_stage.trim();
    if target_stage.is_empty() {
        return Err(ApiError::InvalidInput("目标环节不能为空".to_string()));
    }
    Ok(target_stage)
}
