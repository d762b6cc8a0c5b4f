/// The kind of error a collaborator reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The credential was missing, expired or rejected.
    Unauthorized,
    /// The connection failed, or broke while reading a body.
    Transport,
    /// The service answered with something that could not be decoded.
    InvalidResponse,
    /// Any other errors.
    Other,
}
