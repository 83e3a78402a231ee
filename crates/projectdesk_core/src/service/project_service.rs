//! Project, membership and invitation use-case service.
//!
//! # Responsibility
//! - Create projects together with the owner's manager membership.
//! - Issue collision-checked invitation codes.
//! - Resolve invitation codes into memberships (idempotent join).
//!
//! # Invariants
//! - Every project has its responsible user as a `Manager` member, and that
//!   member cannot be demoted or removed.
//! - Joining a project twice leaves exactly one membership row and keeps the
//!   existing role.
//! - A failed create attempt leaves no project and no membership behind.

use crate::model::project::{
    InvitationPreview, NewProject, Project, ProjectId, ProjectMember, ProjectPatch, ProjectRole,
};
use crate::model::user::{User, UserId};
use crate::model::validation::{normalize_invitation_code, ModelValidationError, INVITATION_CODE_LEN};
use crate::repo::error::{ConflictKind, EntityKind, RepoError};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use log::{info, warn};
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const INVITATION_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on fresh codes tried before `create_project` gives up.
pub const MAX_INVITATION_CODE_ATTEMPTS: u32 = 8;

/// Source of candidate invitation codes.
///
/// Candidates are not assumed unique; `ProjectService` retries on conflict.
pub trait InvitationCodeSource {
    fn next_code(&self) -> String;
}

/// Uniformly random `[A-Z0-9]{10}` codes from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInvitationCodes;

impl InvitationCodeSource for RandomInvitationCodes {
    fn next_code(&self) -> String {
        generate_invitation_code(&mut rand::thread_rng())
    }
}

/// Draws one invitation code from `rng`.
pub fn generate_invitation_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..INVITATION_CODE_LEN)
        .map(|_| char::from(INVITATION_CHARSET[rng.gen_range(0..INVITATION_CHARSET.len())]))
        .collect()
}

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new membership was created with the join default role.
    Joined(ProjectMember),
    /// The user was already a member; nothing changed.
    AlreadyMember(ProjectMember),
}

impl JoinOutcome {
    pub fn member(&self) -> &ProjectMember {
        match self {
            Self::Joined(member) | Self::AlreadyMember(member) => member,
        }
    }

    pub fn is_new_member(&self) -> bool {
        matches!(self, Self::Joined(_))
    }
}

/// Errors from project service operations.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Input failed field validation.
    Validation(ModelValidationError),
    UserNotFound(UserId),
    ProjectNotFound(ProjectId),
    MemberNotFound {
        project_id: ProjectId,
        user_id: UserId,
    },
    /// No project uses this invitation code.
    InvitationNotFound(String),
    /// Every generated code collided with an existing project.
    InvitationCodeExhausted { attempts: u32 },
    /// The responsible user must stay a manager member.
    OwnerMustStayManager(UserId),
    /// Uniqueness violation not handled by the operation itself.
    Conflict(ConflictKind),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::MemberNotFound {
                project_id,
                user_id,
            } => write!(f, "user {user_id} is not a member of project {project_id}"),
            Self::InvitationNotFound(code) => write!(f, "no project for invitation code `{code}`"),
            Self::InvitationCodeExhausted { attempts } => write!(
                f,
                "could not allocate a unique invitation code after {attempts} attempts"
            ),
            Self::OwnerMustStayManager(id) => {
                write!(f, "responsible user {id} must remain a project manager")
            }
            Self::Conflict(kind) => write!(f, "conflict: {kind}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for ProjectServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ProjectServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(EntityKind::Project, id) => Self::ProjectNotFound(id),
            RepoError::NotFound(EntityKind::User, id) => Self::UserNotFound(id),
            RepoError::Conflict(kind) => Self::Conflict(kind),
            other => Self::Repo(other),
        }
    }
}

/// Project service facade.
pub struct ProjectService<R: ProjectRepository, C: InvitationCodeSource = RandomInvitationCodes> {
    repo: R,
    codes: C,
}

impl<R: ProjectRepository> ProjectService<R> {
    /// Creates a service issuing random invitation codes.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            codes: RandomInvitationCodes,
        }
    }
}

impl<R: ProjectRepository, C: InvitationCodeSource> ProjectService<R, C> {
    /// Creates a service with a caller-provided invitation code source.
    pub fn with_code_source(repo: R, codes: C) -> Self {
        Self { repo, codes }
    }

    /// Registers a user identity.
    pub fn create_user(&self, username: &str) -> Result<User, ProjectServiceError> {
        self.repo.create_user(username).map_err(Into::into)
    }

    pub fn get_user(&self, id: UserId) -> Result<User, ProjectServiceError> {
        self.repo
            .get_user(id)?
            .ok_or(ProjectServiceError::UserNotFound(id))
    }

    /// Creates a project owned by `owner`, who becomes its manager.
    ///
    /// # Errors
    /// - `Validation` for a blank name.
    /// - `UserNotFound` when `owner` does not exist.
    /// - `InvitationCodeExhausted` when every candidate code collided.
    pub fn create_project(
        &self,
        owner: UserId,
        request: NewProject,
    ) -> Result<Project, ProjectServiceError> {
        request.validate()?;
        if self.repo.get_user(owner)?.is_none() {
            return Err(ProjectServiceError::UserNotFound(owner));
        }

        let project_id = Uuid::new_v4();
        for attempt in 1..=MAX_INVITATION_CODE_ATTEMPTS {
            let project = request
                .clone()
                .into_project(project_id, owner, self.codes.next_code());
            match self.repo.create_project_with_manager(&project) {
                Ok(stored) => {
                    info!(
                        "event=project_create module=service status=ok project_id={} attempts={}",
                        stored.id, attempt
                    );
                    return Ok(stored);
                }
                Err(RepoError::Conflict(ConflictKind::InvitationCode)) => {
                    warn!(
                        "event=project_create module=service status=retry reason=invitation_code_conflict attempt={}",
                        attempt
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(
            "event=project_create module=service status=error error_code=invitation_code_exhausted attempts={}",
            MAX_INVITATION_CODE_ATTEMPTS
        );
        Err(ProjectServiceError::InvitationCodeExhausted {
            attempts: MAX_INVITATION_CODE_ATTEMPTS,
        })
    }

    /// Joins `user` to the project behind `invitation_code`.
    ///
    /// Re-joining is a no-op success reported as `JoinOutcome::AlreadyMember`.
    pub fn join_project(
        &self,
        user: UserId,
        invitation_code: &str,
    ) -> Result<JoinOutcome, ProjectServiceError> {
        let project = self.project_for_code(invitation_code)?;
        if self.repo.get_user(user)?.is_none() {
            return Err(ProjectServiceError::UserNotFound(user));
        }

        if let Some(existing) = self.repo.get_member(project.id, user)? {
            info!(
                "event=project_join module=service status=ok outcome=already_member project_id={}",
                project.id
            );
            return Ok(JoinOutcome::AlreadyMember(existing));
        }

        match self
            .repo
            .add_member(project.id, user, ProjectRole::join_default())
        {
            Ok(member) => {
                info!(
                    "event=project_join module=service status=ok outcome=joined project_id={}",
                    project.id
                );
                Ok(JoinOutcome::Joined(member))
            }
            Err(RepoError::Conflict(ConflictKind::Membership)) => {
                let existing = self.repo.get_member(project.id, user)?.ok_or(
                    ProjectServiceError::MemberNotFound {
                        project_id: project.id,
                        user_id: user,
                    },
                )?;
                Ok(JoinOutcome::AlreadyMember(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Describes the project behind an invitation code without joining it.
    pub fn preview_invitation(
        &self,
        invitation_code: &str,
    ) -> Result<InvitationPreview, ProjectServiceError> {
        let project = self.project_for_code(invitation_code)?;
        let owner = self
            .repo
            .get_user(project.responsible_user_id)?
            .ok_or(ProjectServiceError::UserNotFound(project.responsible_user_id))?;

        Ok(InvitationPreview {
            project_id: project.id,
            project_name: project.name,
            responsible_username: owner.username,
        })
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_project(id)?
            .ok_or(ProjectServiceError::ProjectNotFound(id))
    }

    /// Lists projects using search, member filter, sort and pagination.
    pub fn list_projects(
        &self,
        query: &ProjectListQuery,
    ) -> Result<Vec<Project>, ProjectServiceError> {
        self.repo.list_projects(query).map_err(Into::into)
    }

    /// Applies a partial update and returns the stored project.
    pub fn update_project(
        &self,
        id: ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, ProjectServiceError> {
        let mut project = self.get_project(id)?;
        if patch.is_empty() {
            return Ok(project);
        }

        patch.apply(&mut project);
        self.repo.update_project(&project)?;
        self.get_project(id)
    }

    /// Deletes a project with its whole hierarchy, memberships, assignments
    /// and notifications.
    pub fn delete_project(&self, id: ProjectId) -> Result<(), ProjectServiceError> {
        self.repo.delete_project(id)?;
        info!(
            "event=project_delete module=service status=ok project_id={}",
            id
        );
        Ok(())
    }

    pub fn list_members(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProjectMember>, ProjectServiceError> {
        self.get_project(project_id)?;
        self.repo.list_members(project_id).map_err(Into::into)
    }

    pub fn set_member_role(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
    ) -> Result<ProjectMember, ProjectServiceError> {
        let project = self.get_project(project_id)?;
        if user_id == project.responsible_user_id && role != ProjectRole::Manager {
            return Err(ProjectServiceError::OwnerMustStayManager(user_id));
        }

        self.repo
            .set_member_role(project_id, user_id, role)
            .map_err(|err| member_error(err, project_id, user_id))?;
        self.repo
            .get_member(project_id, user_id)?
            .ok_or(ProjectServiceError::MemberNotFound {
                project_id,
                user_id,
            })
    }

    pub fn remove_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<(), ProjectServiceError> {
        let project = self.get_project(project_id)?;
        if user_id == project.responsible_user_id {
            return Err(ProjectServiceError::OwnerMustStayManager(user_id));
        }

        self.repo
            .remove_member(project_id, user_id)
            .map_err(|err| member_error(err, project_id, user_id))?;
        info!(
            "event=member_remove module=service status=ok project_id={}",
            project_id
        );
        Ok(())
    }

    /// A code that cannot name any project is reported as not found.
    fn project_for_code(&self, invitation_code: &str) -> Result<Project, ProjectServiceError> {
        let code = normalize_invitation_code(invitation_code).map_err(|err| match err {
            ModelValidationError::InvalidInvitationCode(code) => {
                ProjectServiceError::InvitationNotFound(code)
            }
            other => other.into(),
        })?;
        self.repo
            .find_project_by_invitation_code(&code)?
            .ok_or(ProjectServiceError::InvitationNotFound(code))
    }
}

fn member_error(err: RepoError, project_id: ProjectId, user_id: UserId) -> ProjectServiceError {
    match err {
        RepoError::NotFound(EntityKind::Member, _) => ProjectServiceError::MemberNotFound {
            project_id,
            user_id,
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{generate_invitation_code, JoinOutcome, ProjectService};
    use crate::model::project::{NewProject, Project, ProjectId, ProjectMember, ProjectRole};
    use crate::model::user::{User, UserId};
    use crate::model::validation::validate_invitation_code;
    use crate::repo::error::{ConflictKind, RepoError, RepoResult};
    use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;
    use uuid::Uuid;

    const CODE: &str = "RACE000001";

    /// Repository where another request inserts the membership between the
    /// lookup and the insert.
    struct LostJoinRace {
        project: Project,
        user: User,
        member_lookups: Cell<usize>,
    }

    impl LostJoinRace {
        fn new() -> Self {
            let owner = Uuid::new_v4();
            Self {
                project: NewProject::new("Apollo", 0).into_project(Uuid::new_v4(), owner, CODE),
                user: User {
                    id: Uuid::new_v4(),
                    username: "grace".to_string(),
                    created_at: 0,
                },
                member_lookups: Cell::new(0),
            }
        }
    }

    impl ProjectRepository for LostJoinRace {
        fn create_user(&self, _username: &str) -> RepoResult<User> {
            unreachable!()
        }

        fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
            Ok((id == self.user.id).then(|| self.user.clone()))
        }

        fn create_project_with_manager(&self, _project: &Project) -> RepoResult<Project> {
            unreachable!()
        }

        fn get_project(&self, _id: ProjectId) -> RepoResult<Option<Project>> {
            unreachable!()
        }

        fn find_project_by_invitation_code(&self, code: &str) -> RepoResult<Option<Project>> {
            Ok((code == CODE).then(|| self.project.clone()))
        }

        fn list_projects(&self, _query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
            unreachable!()
        }

        fn update_project(&self, _project: &Project) -> RepoResult<()> {
            unreachable!()
        }

        fn delete_project(&self, _id: ProjectId) -> RepoResult<()> {
            unreachable!()
        }

        fn add_member(
            &self,
            _project_id: ProjectId,
            _user_id: UserId,
            _role: ProjectRole,
        ) -> RepoResult<ProjectMember> {
            Err(RepoError::Conflict(ConflictKind::Membership))
        }

        fn get_member(
            &self,
            project_id: ProjectId,
            user_id: UserId,
        ) -> RepoResult<Option<ProjectMember>> {
            let lookups = self.member_lookups.get();
            self.member_lookups.set(lookups + 1);
            if lookups == 0 {
                return Ok(None);
            }
            Ok(Some(ProjectMember {
                project_id,
                user_id,
                role: ProjectRole::Stakeholder,
                created_at: 0,
                updated_at: 0,
            }))
        }

        fn list_members(&self, _project_id: ProjectId) -> RepoResult<Vec<ProjectMember>> {
            unreachable!()
        }

        fn set_member_role(
            &self,
            _project_id: ProjectId,
            _user_id: UserId,
            _role: ProjectRole,
        ) -> RepoResult<()> {
            unreachable!()
        }

        fn remove_member(&self, _project_id: ProjectId, _user_id: UserId) -> RepoResult<()> {
            unreachable!()
        }
    }

    #[test]
    fn join_that_loses_the_insert_race_reports_already_member() {
        let repo = LostJoinRace::new();
        let user = repo.user.id;
        let project_id = repo.project.id;
        let service = ProjectService::new(repo);

        let outcome = service.join_project(user, CODE).unwrap();
        assert!(!outcome.is_new_member());
        match outcome {
            JoinOutcome::AlreadyMember(member) => {
                assert_eq!(member.project_id, project_id);
                assert_eq!(member.user_id, user);
                assert_eq!(member.role, ProjectRole::Stakeholder);
            }
            JoinOutcome::Joined(_) => panic!("lost race must not report a new membership"),
        }
        assert_eq!(service.repo.member_lookups.get(), 2);
    }

    #[test]
    fn generated_codes_have_the_invitation_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let code = generate_invitation_code(&mut rng);
            assert!(validate_invitation_code(&code).is_ok(), "bad code {code}");
        }
    }

    #[test]
    fn same_seed_gives_same_code() {
        let first = generate_invitation_code(&mut StdRng::seed_from_u64(42));
        let second = generate_invitation_code(&mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }
}
