//! SeaORM entity models
//!
//! Database entities for CaseDesk

mod user;
mod vendor;
mod field_officer;
mod record;
mod verification;
mod candidate_token;
mod counter;
mod short_link;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use vendor::{
    Entity as VendorEntity,
    Model as Vendor,
    ActiveModel as VendorActiveModel,
    Column as VendorColumn,
    AccountStatus,
};

pub use field_officer::{
    Entity as FieldOfficerEntity,
    Model as FieldOfficer,
    ActiveModel as FieldOfficerActiveModel,
    Column as FieldOfficerColumn,
};

pub use record::{
    Entity as RecordEntity,
    Model as Record,
    ActiveModel as RecordActiveModel,
    Column as RecordColumn,
    RecordSource,
};

pub use verification::{
    Entity as VerificationEntity,
    Model as Verification,
    ActiveModel as VerificationActiveModel,
    Column as VerificationColumn,
};

pub use candidate_token::{
    Entity as CandidateTokenEntity,
    Model as CandidateToken,
    ActiveModel as CandidateTokenActiveModel,
    Column as CandidateTokenColumn,
};

pub use counter::{
    Entity as CounterEntity,
    Model as Counter,
    ActiveModel as CounterActiveModel,
    Column as CounterColumn,
};

pub use short_link::{
    Entity as ShortLinkEntity,
    Model as ShortLink,
    ActiveModel as ShortLinkActiveModel,
    Column as ShortLinkColumn,
};
