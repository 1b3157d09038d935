pub mod domain;
pub mod ports;
pub mod token;

pub use domain::{
    AuthSession, FileKind, Order, OrderStatus, Product, ProductKind, User, UserCredentials,
};
pub use ports::{
    CheckoutSession, CheckoutSessionRequest, EmailMessage, MailerService, PaymentService,
    PortError, PortResult, StoreService,
};
pub use token::{DownloadToken, InvalidToken};
