//! Shale runtime values.
//!
//! Everything a dynamic operation can observe at run time: the [`Value`]
//! enum and its collection payloads, the [`Wrapper`] that carries adjunct
//! members and type names, reflection descriptors for host types, and the
//! [`EvalError`] taxonomy every operation reports through.

mod errors;
mod host;
mod value;
mod wrapper;

pub use errors::{
    ambiguous_overload, arithmetic_overflow, by_ref_like_member, cycle_detected, divide_by_zero,
    duplicate_key, index_out_of_range, invalid_shape, member_not_found, native_error,
    no_conversion, not_comparable, null_target, operator_not_defined, read_only_member,
    security_violation, write_only_member, ErrorKind, EvalError, EvalResult,
};
pub use host::{
    same_name, CompareFn, EqualityFn, HostIndexer, HostMethod, HostObject, HostProperty,
    HostType, HostTypeBuilder, HostTypeId, HostTypeRef, NativeFn, Overload, ParamType,
    Visibility,
};
pub use rust_decimal::Decimal;
pub use value::{ArrayValue, DictKey, DictValue, Heap, ListValue, TypeKey, Value, WeakHeap};
pub use wrapper::{Adjunct, Member, MemberKind, MemberSet, Wrapper};
