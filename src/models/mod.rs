//! Core data structures: schema kinds, raw schemas, tools and invocation
//! details.

mod invocation;
mod openapi;
mod schema;
mod tool;

pub use invocation::{InvocationDetails, Transport};
pub use openapi::{
    Components, Info, MediaType, OpenApiDocument, Operation, Parameter, PathItem, RequestBody,
    Response, SchemaObject, SchemaType, Server,
};
pub use schema::{
    ConnectMode, GrpcSchema, MethodInfo, ParsedSchema, ProtoMeta, RawSchema, SchemaKind,
    ServiceInfo,
};
pub use tool::{JsonSchema, Tool, TOOL_NAME_MAX_LEN};
