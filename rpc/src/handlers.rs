//! RPC request handlers.
//!
//! Each handler decodes its JSON body, converts wire values into engine
//! types, and forwards to the façade.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use sacco_engine::{
    ChainRecord, ChainStats, FinancialAnalytics, GovernanceFacade, GroupView, LoanTerms, LoanView,
    MemberDashboard, MemberSummary, MyGroup, NewGroup, VerifiedRecord, VoteOutcome,
    VotingAnalytics,
};
use sacco_store::{AuditSink, ContributionRecord, MembershipRecord, SaccoStore};
use sacco_types::{Amount, BasisPoints, GroupId, LoanId, MembershipId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::RpcResult;

pub type AppState<S, A> = Arc<GovernanceFacade<S, A>>;

fn parse_amount(raw: &str) -> RpcResult<Amount> {
    Ok(raw.trim().parse::<Amount>()?)
}

// ── Health ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

// ── Groups ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub admin_id: UserId,
    /// Fraction of approved members whose approval admits a newcomer.
    pub approval_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub group_id: GroupId,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Serialize)]
pub struct MyGroupsResponse {
    pub groups: Vec<MyGroup>,
}

pub async fn create_group<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<CreateGroupRequest>,
) -> RpcResult<Json<GroupView>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let group = facade
        .create_group(NewGroup {
            name: req.name,
            description: req.description,
            admin: req.admin_id,
            approval_threshold: req.approval_threshold,
        })
        .await?;
    Ok(Json(group))
}

pub async fn list_groups<S, A>(State(facade): State<AppState<S, A>>) -> RpcResult<Json<GroupsResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(GroupsResponse {
        groups: facade.list_groups()?,
    }))
}

pub async fn get_group<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<GroupRequest>,
) -> RpcResult<Json<GroupView>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.get_group(&req.group_id)?))
}

pub async fn my_groups<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<UserRequest>,
) -> RpcResult<Json<MyGroupsResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(MyGroupsResponse {
        groups: facade.list_my_groups(&req.user_id)?,
    }))
}

// ── Membership ───────────────────────────────────────────────────────────

/// Identifies one member of one group. Shared by join, listing and dashboard calls.
#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub group_id: GroupId,
    pub target_membership_id: MembershipId,
    pub voter_id: UserId,
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct RosterRequest {
    pub group_id: GroupId,
    pub requester_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub show_profile: bool,
}

#[derive(Debug, Serialize)]
pub struct PendingResponse {
    pub pending: Vec<MembershipRecord>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberSummary>,
}

pub async fn request_join<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<MemberRequest>,
) -> RpcResult<Json<MembershipRecord>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.request_join(&req.group_id, &req.user_id).await?))
}

pub async fn cast_vote<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<VoteRequest>,
) -> RpcResult<Json<VoteOutcome>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let outcome = facade
        .cast_vote(
            &req.group_id,
            &req.target_membership_id,
            &req.voter_id,
            req.approve,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn list_pending<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<PendingResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(PendingResponse {
        pending: facade.list_pending(&req.group_id, &req.requester_id)?,
    }))
}

pub async fn list_approved<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<MembersResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(MembersResponse {
        members: facade.list_approved_members(&req.group_id, &req.requester_id)?,
    }))
}

pub async fn set_privacy<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<PrivacyRequest>,
) -> RpcResult<Json<MembershipRecord>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.set_privacy(
        &req.group_id,
        &req.user_id,
        req.show_profile,
    )?))
}

// ── Savings ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub amount: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContributionsResponse {
    pub contributions: Vec<ContributionRecord>,
}

pub async fn record_contribution<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<ContributionRequest>,
) -> RpcResult<Json<ContributionRecord>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let amount = parse_amount(&req.amount)?;
    let record = facade
        .record_contribution(&req.group_id, &req.user_id, amount, req.description)
        .await?;
    Ok(Json(record))
}

pub async fn list_contributions<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<MemberRequest>,
) -> RpcResult<Json<ContributionsResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(ContributionsResponse {
        contributions: facade.list_contributions(&req.group_id, &req.user_id)?,
    }))
}

// ── Loans ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoanRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub amount: String,
    /// Annual rate as a fraction, e.g. `0.12`.
    pub interest_rate: Option<f64>,
    pub duration_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RepaymentRequest {
    pub loan_id: LoanId,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct LoansResponse {
    pub loans: Vec<LoanView>,
}

pub async fn request_loan<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<LoanRequest>,
) -> RpcResult<Json<LoanView>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let principal = parse_amount(&req.amount)?;
    let terms = LoanTerms {
        interest_rate: req.interest_rate.map(BasisPoints::from_fraction).transpose()?,
        duration_months: req.duration_months,
    };
    let loan = facade
        .request_loan(&req.group_id, &req.user_id, principal, terms)
        .await?;
    Ok(Json(loan))
}

pub async fn record_repayment<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RepaymentRequest>,
) -> RpcResult<Json<LoanView>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    let amount = parse_amount(&req.amount)?;
    Ok(Json(facade.record_repayment(&req.loan_id, amount)?))
}

pub async fn list_loans<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<MemberRequest>,
) -> RpcResult<Json<LoansResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(LoansResponse {
        loans: facade.list_loans(&req.group_id, &req.user_id)?,
    }))
}

// ── Dashboard ────────────────────────────────────────────────────────────

pub async fn dashboard<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<MemberRequest>,
) -> RpcResult<Json<MemberDashboard>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.get_member_dashboard(&req.group_id, &req.user_id)?))
}

// ── Audit trail ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub requester_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct TrailResponse {
    pub records: Vec<VerifiedRecord>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<ChainRecord>,
}

pub async fn audit_trail<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<TrailResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(TrailResponse {
        records: facade.audit_trail(&req.group_id, &req.requester_id)?,
    }))
}

pub async fn audit_history<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<HistoryRequest>,
) -> RpcResult<Json<HistoryResponse>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(HistoryResponse {
        records: facade.member_audit_history(&req.group_id, &req.user_id, &req.requester_id)?,
    }))
}

pub async fn audit_stats<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<ChainStats>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.audit_stats(&req.group_id, &req.requester_id)?))
}

pub async fn voting_analytics<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<VotingAnalytics>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.voting_analytics(&req.group_id, &req.requester_id)?))
}

pub async fn financial_analytics<S, A>(
    State(facade): State<AppState<S, A>>,
    Json(req): Json<RosterRequest>,
) -> RpcResult<Json<FinancialAnalytics>>
where
    S: SaccoStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(facade.financial_analytics(&req.group_id, &req.requester_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_surrounding_whitespace() {
        assert_eq!(parse_amount(" 150.5 ").unwrap(), Amount::from_parts(150, 50));
        assert!(parse_amount("-3").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn loan_request_terms_are_optional() {
        let req: LoanRequest = serde_json::from_value(serde_json::json!({
            "group_id": GroupId::generate(),
            "user_id": "alice",
            "amount": "1000",
        }))
        .unwrap();
        assert!(req.interest_rate.is_none());
        assert!(req.duration_months.is_none());
    }
}
