// Ent Privacy System - access control for every blog resource
// A priority-ordered chain of pure rules; the first rule with an opinion wins

use once_cell::sync::Lazy;

use crate::{
    error::{AppError, AppResult},
    infrastructure::{actor::Actor, auth::AuthFailure},
};

/// Operations that can be controlled by privacy policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyOperation {
    Read,
    Create,
    Update,
    Delete,
}

impl PrivacyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyOperation::Read => "read",
            PrivacyOperation::Create => "create",
            PrivacyOperation::Update => "update",
            PrivacyOperation::Delete => "delete",
        }
    }
}

/// The resource an operation targets. Owned resources carry their author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Article { author_id: i64 },
    Comment { author_id: i64 },
    Tag,
    Category,
    User,
    SiteStatistics,
    ActivityLog,
}

impl Resource {
    pub fn author_id(&self) -> Option<i64> {
        match self {
            Resource::Article { author_id } | Resource::Comment { author_id } => Some(*author_id),
            _ => None,
        }
    }

    /// Resources that are never publicly readable
    pub fn is_administrative(&self) -> bool {
        matches!(self, Resource::User | Resource::SiteStatistics | Resource::ActivityLog)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Article { .. } => "article",
            Resource::Comment { .. } => "comment",
            Resource::Tag => "tag",
            Resource::Category => "category",
            Resource::User => "user",
            Resource::SiteStatistics => "site statistics",
            Resource::ActivityLog => "activity log",
        }
    }
}

/// Privacy rule result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyResult {
    Allow,
    Deny,
    Skip,
}

/// Inputs of a single decision
#[derive(Debug, Clone, Copy)]
pub struct PrivacyContext<'a> {
    pub actor: &'a Actor,
    pub operation: PrivacyOperation,
    pub resource: Resource,
}

pub trait PrivacyRule: Send + Sync {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult;

    fn name(&self) -> &str;

    /// Higher = evaluated first
    fn priority(&self) -> i32;
}

#[derive(Default)]
pub struct PrivacyRegistry {
    rules: Vec<Box<dyn PrivacyRule>>,
}

impl PrivacyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_rule(&mut self, rule: Box<dyn PrivacyRule>) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        for rule in &self.rules {
            match rule.evaluate(ctx) {
                PrivacyResult::Skip => continue,
                decided => {
                    tracing::trace!(
                        rule = rule.name(),
                        operation = ?ctx.operation,
                        resource = ctx.resource.name(),
                        result = ?decided,
                        "privacy rule decided"
                    );
                    return decided;
                }
            }
        }

        // Default to deny if no rules explicitly allow
        PrivacyResult::Deny
    }
}

/// Administrative resources require staff for every operation, reads included
pub struct AdminResourceRule;

impl PrivacyRule for AdminResourceRule {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        if !ctx.resource.is_administrative() {
            return PrivacyResult::Skip;
        }
        if ctx.actor.is_staff() {
            PrivacyResult::Allow
        } else {
            PrivacyResult::Deny
        }
    }

    fn name(&self) -> &str {
        "admin_resource"
    }

    fn priority(&self) -> i32 {
        1000
    }
}

/// Everything else is publicly readable
pub struct PublicReadRule;

impl PrivacyRule for PublicReadRule {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        match ctx.operation {
            PrivacyOperation::Read => PrivacyResult::Allow,
            _ => PrivacyResult::Skip,
        }
    }

    fn name(&self) -> &str {
        "public_read"
    }

    fn priority(&self) -> i32 {
        900
    }
}

/// Any authenticated actor may create
pub struct AuthenticatedCreateRule;

impl PrivacyRule for AuthenticatedCreateRule {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        match ctx.operation {
            PrivacyOperation::Create if ctx.actor.is_authenticated() => PrivacyResult::Allow,
            PrivacyOperation::Create => PrivacyResult::Deny,
            _ => PrivacyResult::Skip,
        }
    }

    fn name(&self) -> &str {
        "authenticated_create"
    }

    fn priority(&self) -> i32 {
        800
    }
}

/// Authored resources may be changed by their author or by staff
pub struct AuthorOrAdminRule;

impl PrivacyRule for AuthorOrAdminRule {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        if !matches!(ctx.operation, PrivacyOperation::Update | PrivacyOperation::Delete) {
            return PrivacyResult::Skip;
        }
        let Some(author_id) = ctx.resource.author_id() else {
            return PrivacyResult::Skip;
        };
        if ctx.actor.is_author_of(author_id) || ctx.actor.is_staff() {
            PrivacyResult::Allow
        } else {
            PrivacyResult::Deny
        }
    }

    fn name(&self) -> &str {
        "author_or_admin"
    }

    fn priority(&self) -> i32 {
        700
    }
}

/// Tags and categories have no owner; only staff edit them
pub struct StaffEditRule;

impl PrivacyRule for StaffEditRule {
    fn evaluate(&self, ctx: &PrivacyContext<'_>) -> PrivacyResult {
        if !matches!(ctx.operation, PrivacyOperation::Update | PrivacyOperation::Delete) {
            return PrivacyResult::Skip;
        }
        if !matches!(ctx.resource, Resource::Tag | Resource::Category) {
            return PrivacyResult::Skip;
        }
        if ctx.actor.is_staff() {
            PrivacyResult::Allow
        } else {
            PrivacyResult::Deny
        }
    }

    fn name(&self) -> &str {
        "staff_edit"
    }

    fn priority(&self) -> i32 {
        600
    }
}

pub fn create_default_privacy_registry() -> PrivacyRegistry {
    let mut registry = PrivacyRegistry::new();
    registry.register_rule(Box::new(AdminResourceRule));
    registry.register_rule(Box::new(PublicReadRule));
    registry.register_rule(Box::new(AuthenticatedCreateRule));
    registry.register_rule(Box::new(AuthorOrAdminRule));
    registry.register_rule(Box::new(StaffEditRule));
    registry
}

static DEFAULT_REGISTRY: Lazy<PrivacyRegistry> = Lazy::new(create_default_privacy_registry);

/// Pure decision: may `actor` perform `operation` on `resource`?
pub fn can(actor: &Actor, operation: PrivacyOperation, resource: Resource) -> bool {
    let ctx = PrivacyContext { actor, operation, resource };
    DEFAULT_REGISTRY.evaluate(&ctx) == PrivacyResult::Allow
}

/// `can` lifted into an error: anonymous actors get `Unauthenticated`,
/// authenticated ones `PermissionDenied`.
pub fn authorize(actor: &Actor, operation: PrivacyOperation, resource: Resource) -> AppResult<()> {
    if can(actor, operation, resource) {
        return Ok(());
    }
    if !actor.is_authenticated() {
        return Err(AppError::Unauthenticated(AuthFailure::Missing));
    }
    Err(AppError::PermissionDenied(format!(
        "You do not have permission to {} this {}",
        operation.as_str(),
        resource.name()
    )))
}
