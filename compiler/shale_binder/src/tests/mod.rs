//! Crate-level tests exercising resolution through the engine.
//!
//! `fixture` builds a small host type, `Contoso.Widget`, shared by the
//! member and index tests.

mod compare_tests;
mod members_tests;
mod numeric_tests;
mod ops_tests;

pub(crate) mod fixture {
    use std::sync::{Arc, OnceLock};

    use parking_lot::Mutex;
    use shale_ir::ScalarType;
    use shale_value::{
        native_error, EvalError, HostProperty, HostTypeBuilder, HostTypeRef, ParamType, Value,
        Visibility,
    };

    pub(crate) struct WidgetState {
        pub name: Mutex<String>,
        pub size: Mutex<i32>,
    }

    static WIDGET: OnceLock<HostTypeRef> = OnceLock::new();

    fn state(recv: &Value) -> Result<&WidgetState, EvalError> {
        recv.as_host_object()
            .and_then(|o| o.payload::<WidgetState>())
            .ok_or_else(|| native_error("receiver is not a widget"))
    }

    fn text(args: &[Value]) -> String {
        args.first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub(crate) fn widget_type() -> HostTypeRef {
        WIDGET.get_or_init(build_widget_type).clone()
    }

    pub(crate) fn widget(name: &str) -> Value {
        Value::host(
            widget_type(),
            WidgetState {
                name: Mutex::new(name.to_string()),
                size: Mutex::new(0),
            },
        )
    }

    pub(crate) fn widget_name(value: &Value) -> String {
        state(value.base()).map(|s| s.name.lock().clone()).unwrap_or_default()
    }

    fn build_widget_type() -> HostTypeRef {
        let builder = HostTypeBuilder::new("Contoso.Widget");
        let id = builder.id();
        builder
            .property_rw(
                "Name",
                |recv, _| Ok(Value::string(state(recv)?.name.lock().as_str())),
                |recv, args| {
                    *state(recv)?.name.lock() = text(args);
                    Ok(Value::Null)
                },
            )
            .member_property(HostProperty {
                name: "Size".to_string(),
                getter: Some(Arc::new(|recv: &Value, _: &[Value]| {
                    Ok(Value::Int32(*state(recv)?.size.lock()))
                })),
                setter: Some(Arc::new(|recv: &Value, args: &[Value]| {
                    let size = match args.first() {
                        Some(Value::Int32(n)) => *n,
                        _ => return Err(native_error("size must be an int")),
                    };
                    *state(recv)?.size.lock() = size;
                    Ok(Value::Null)
                })),
                value_type: ParamType::Scalar(ScalarType::Int32),
                visibility: Visibility::Public,
                is_static: false,
                by_ref_like: false,
                declaring_type: id,
            })
            .member_property(HostProperty {
                name: "Secret".to_string(),
                getter: Some(Arc::new(|_: &Value, _: &[Value]| Ok(Value::string("hidden")))),
                setter: None,
                value_type: ParamType::Object,
                visibility: Visibility::Private,
                is_static: false,
                by_ref_like: false,
                declaring_type: id,
            })
            .member_property(HostProperty {
                name: "Span".to_string(),
                getter: Some(Arc::new(|_: &Value, _: &[Value]| Ok(Value::Null))),
                setter: None,
                value_type: ParamType::Object,
                visibility: Visibility::Public,
                is_static: false,
                by_ref_like: true,
                declaring_type: id,
            })
            .property("Count", |_, _| Ok(Value::Int32(3)))
            .method("Describe", vec![ParamType::Scalar(ScalarType::Int32)], |_, _| {
                Ok(Value::string("int"))
            })
            .method("Describe", vec![ParamType::Scalar(ScalarType::String)], |_, _| {
                Ok(Value::string("string"))
            })
            .method("Describe", vec![ParamType::Scalar(ScalarType::Double)], |_, _| {
                Ok(Value::string("double"))
            })
            .method("Pick", vec![ParamType::Scalar(ScalarType::Int64)], |_, _| {
                Ok(Value::string("long"))
            })
            .method("Pick", vec![ParamType::Scalar(ScalarType::Decimal)], |_, _| {
                Ok(Value::string("decimal"))
            })
            .static_property("Default", |_, _| Ok(Value::Int32(42)))
            .static_method("Create", vec![ParamType::Scalar(ScalarType::String)], |_, args| {
                Ok(widget(&text(args)))
            })
            .constructor(vec![], |_, _| Ok(widget("")))
            .constructor(vec![ParamType::Scalar(ScalarType::String)], |_, args| {
                Ok(widget(&text(args)))
            })
            .indexer(
                vec![ParamType::Scalar(ScalarType::Int32)],
                Some(Arc::new(|_: &Value, args: &[Value]| {
                    match args.first() {
                        Some(Value::Int32(i)) => Ok(Value::Int32(i * 10)),
                        _ => Err(native_error("bad index")),
                    }
                })),
                None,
            )
            .build()
    }
}
