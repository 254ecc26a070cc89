pub mod orders;

pub use orders::{
    AddTrackingEventRequest, AddressInput, CreateOrderRequest, OrderDetails, OrderItemInput,
    OrderLifecycleService, OrderListView, RequestReturnRequest, ReturnItemInput,
    ReturnRequestView, UpdateOrderStatusRequest,
};
